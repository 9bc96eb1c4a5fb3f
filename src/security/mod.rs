//! ACL-based result filtering
//!
//! Turns a flat set of authority strings into a per-segment visibility mask
//! over the content index, via the descriptor index:
//! document -> descriptor id -> authorities.

pub mod authority_query;
pub mod bitset;
pub mod cache;
pub mod filter;
pub mod identifier_set;

pub use authority_query::AuthorityQuery;
pub use bitset::FixedBitSet;
pub use cache::{CacheStats, FilterCache};
pub use filter::{DocumentFilter, SecurityFilterBuilder, SecuritySnapshot, SegmentFilter};
pub use identifier_set::IdentifierSet;
