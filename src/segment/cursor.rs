//! Global ordinal to (segment, docno) translation
//!
//! The cursor is a monotonic pointer over the segments of a snapshot. Callers
//! present ascending global ordinals, so locating is amortized O(1): the
//! cursor only ever steps to the following segment.

use super::docvalues::NumericDocValues;
use super::reader::LeafReader;
use super::types::{DocNo, GlobalOrdinal};
use crate::{AclShardError, Result};

/// One segment as seen by the cursor
#[derive(Clone, Copy)]
pub struct LeafSlot<'a> {
    /// Global ordinal of the segment's first document
    pub base: GlobalOrdinal,
    pub doc_count: u32,
    /// Column to read, `None` if the segment has no values for it
    pub values: Option<&'a dyn NumericDocValues>,
}

impl LeafSlot<'_> {
    /// Exclusive upper bound of the slot's ordinal range
    pub fn end(&self) -> GlobalOrdinal {
        self.base + self.doc_count as u64
    }
}

/// Forward-only cursor over a snapshot's segments
pub struct SegmentCursor<'a> {
    slots: Vec<LeafSlot<'a>>,
    current: usize,
}

impl<'a> SegmentCursor<'a> {
    /// Build from explicit slots. Slots must tile the ordinal space:
    /// the first starts at 0 and each starts where the previous ends.
    pub fn new(slots: Vec<LeafSlot<'a>>) -> Result<Self> {
        let mut expected: GlobalOrdinal = 0;
        for (i, slot) in slots.iter().enumerate() {
            if slot.base != expected {
                return Err(AclShardError::config(format!(
                    "segment {} starts at ordinal {}, expected {}",
                    i, slot.base, expected
                )));
            }
            expected = slot.end();
        }
        Ok(Self { slots, current: 0 })
    }

    /// Build over the leaves of a snapshot, resolving `field` per leaf
    pub fn for_field<L: LeafReader>(leaves: &'a [L], field: &str) -> Result<Self> {
        let mut slots = Vec::with_capacity(leaves.len());
        let mut base: GlobalOrdinal = 0;
        for leaf in leaves {
            let values = leaf.numeric_doc_values(field)?;
            slots.push(LeafSlot {
                base,
                doc_count: leaf.doc_count(),
                values,
            });
            base += leaf.doc_count() as u64;
        }
        Ok(Self { slots, current: 0 })
    }

    /// Exclusive upper bound of the whole ordinal space
    pub fn upper_bound(&self) -> GlobalOrdinal {
        self.slots.last().map(|s| s.end()).unwrap_or(0)
    }

    pub fn segment_count(&self) -> usize {
        self.slots.len()
    }

    /// Translate a global ordinal into `(segment index, local docno)`
    pub fn locate(&mut self, ordinal: GlobalOrdinal) -> Result<(usize, DocNo)> {
        if ordinal >= self.upper_bound() {
            return Err(AclShardError::OrdinalOutOfRange {
                ordinal,
                upper_bound: self.upper_bound(),
            });
        }

        if ordinal < self.slots[self.current].base {
            // Out-of-order input; reposition instead of answering wrongly
            self.current = self.slots.partition_point(|s| s.end() <= ordinal);
        }
        while ordinal >= self.slots[self.current].end() {
            self.current += 1;
        }

        let slot = &self.slots[self.current];
        Ok((self.current, DocNo((ordinal - slot.base) as u32)))
    }

    /// Read the column value at a global ordinal
    pub fn value(&mut self, ordinal: GlobalOrdinal) -> Result<Option<i64>> {
        let (segment, docno) = self.locate(ordinal)?;
        match self.slots[segment].values {
            Some(values) => values.get(docno).map_err(|e| match e {
                AclShardError::SegmentRead { reason, .. } => {
                    AclShardError::segment_read(segment, reason)
                }
                other => other,
            }),
            None => Ok(None),
        }
    }
}
