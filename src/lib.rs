pub mod config;
pub mod error;
pub mod routing;
pub mod security;
pub mod segment;

pub use config::{FilterSettings, RouterStrategy, RoutingConfig, Settings, MAX_UNIVERSE_UPPER_BOUND};
pub use error::{AclShardError, Result};
pub use routing::{ContentRecord, DescriptorRecord, ShardRouter};
pub use security::{DocumentFilter, FilterCache, IdentifierSet, SecurityFilterBuilder, SecuritySnapshot};
pub use segment::{IndexSnapshot, SegmentCursor, SnapshotHolder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
