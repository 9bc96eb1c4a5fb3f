//! Segment-based index storage
//!
//! # Architecture
//!
//! - `SegmentWriter`: Buffers documents, seals them into a segment
//! - `SegmentReader`: Immutable in-memory segment (doc values + term postings)
//! - `IndexSnapshot`: Ordered list of live segments at one generation
//! - `SnapshotHolder`: Atomic publication of new snapshots
//! - `SegmentCursor`: Global ordinal to (segment, docno) translation

mod cursor;
mod docvalues;
mod reader;
mod snapshot;
mod terms;
mod types;
mod writer;

pub use cursor::*;
pub use docvalues::*;
pub use reader::*;
pub use snapshot::*;
pub use terms::*;
pub use types::*;
pub use writer::*;
