//! Read-side abstractions over sealed segments
//!
//! `LeafReader` is one immutable segment; `IndexReader` is an ordered list of
//! leaves forming a snapshot. Security filtering is written against these
//! traits so that storage-backed readers and test doubles plug in alike.

use std::sync::Arc;

use roaring::RoaringBitmap;

use super::docvalues::{NumericDocValues, NumericFields};
use super::terms::TermIndex;
use super::types::{SegmentId, SegmentMeta};
use crate::Result;

/// One immutable segment of an index
pub trait LeafReader: Send + Sync {
    fn segment_id(&self) -> SegmentId;

    /// Number of documents (local docnos are `0..doc_count`)
    fn doc_count(&self) -> u32;

    /// Numeric doc values for a field, `Ok(None)` when no document in the
    /// segment carries the field
    fn numeric_doc_values(&self, field: &str) -> Result<Option<&dyn NumericDocValues>>;

    /// Local docnos carrying an exact term
    fn postings(&self, field: &str, term: &str) -> Result<Option<RoaringBitmap>>;
}

impl<L: LeafReader + ?Sized> LeafReader for Arc<L> {
    fn segment_id(&self) -> SegmentId {
        (**self).segment_id()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }

    fn numeric_doc_values(&self, field: &str) -> Result<Option<&dyn NumericDocValues>> {
        (**self).numeric_doc_values(field)
    }

    fn postings(&self, field: &str, term: &str) -> Result<Option<RoaringBitmap>> {
        (**self).postings(field, term)
    }
}

/// An ordered, immutable list of segments
///
/// Segment order defines the global ordinal space: the base of a leaf is
/// the sum of the doc counts of the leaves before it.
pub trait IndexReader: Send + Sync {
    type Leaf: LeafReader;

    /// Changes whenever the set of live segments changes
    fn generation(&self) -> u64;

    fn leaves(&self) -> &[Self::Leaf];

    /// Total documents across all leaves
    fn max_doc(&self) -> u64 {
        self.leaves().iter().map(|l| l.doc_count() as u64).sum()
    }
}

/// Immutable in-memory segment
#[derive(Debug)]
pub struct SegmentReader {
    meta: SegmentMeta,
    numerics: NumericFields,
    terms: TermIndex,
}

impl SegmentReader {
    pub fn from_memory(meta: SegmentMeta, numerics: NumericFields, terms: TermIndex) -> Self {
        Self {
            meta,
            numerics,
            terms,
        }
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn numerics(&self) -> &NumericFields {
        &self.numerics
    }

    pub fn terms(&self) -> &TermIndex {
        &self.terms
    }
}

impl LeafReader for SegmentReader {
    fn segment_id(&self) -> SegmentId {
        self.meta.id
    }

    fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    fn numeric_doc_values(&self, field: &str) -> Result<Option<&dyn NumericDocValues>> {
        Ok(self
            .numerics
            .column(field)
            .filter(|col| col.value_count() > 0)
            .map(|col| col as &dyn NumericDocValues))
    }

    fn postings(&self, field: &str, term: &str) -> Result<Option<RoaringBitmap>> {
        Ok(self.terms.postings(field, term).cloned())
    }
}
