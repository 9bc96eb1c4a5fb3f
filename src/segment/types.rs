//! Identifiers shared by the segment layer and the security filter

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier, unique within one index
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment_{}", self.0)
    }
}

/// Segment-local document number, dense in `0..doc_count`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocNo(pub u32);

impl DocNo {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Position of this document in the snapshot-wide ordinal space
    pub fn to_global(self, base: GlobalOrdinal) -> GlobalOrdinal {
        base + self.0 as GlobalOrdinal
    }
}

impl From<u32> for DocNo {
    fn from(n: u32) -> Self {
        DocNo(n)
    }
}

/// Document ordinal across all segments of a snapshot.
/// `global = segment base + local docno`.
pub type GlobalOrdinal = u64;

/// Security descriptor id
pub type DescriptorId = u64;

/// Identity and size of a sealed segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: SegmentId,
    pub doc_count: u32,
}

impl SegmentMeta {
    pub fn new(id: SegmentId, doc_count: u32) -> Self {
        Self { id, doc_count }
    }
}
