//! Per-segment term postings for multivalued keyword fields
//!
//! Each `(field, term)` pair maps to the bitmap of local docnos carrying it.
//! Terms are matched by exact string equality, no analysis is applied.

use std::collections::HashMap;

use roaring::RoaringBitmap;

use super::types::DocNo;

#[derive(Clone, Debug, Default)]
pub struct TermIndex {
    fields: HashMap<String, HashMap<String, RoaringBitmap>>,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `docno` carries `term` in `field`
    pub fn insert(&mut self, field: &str, term: &str, docno: DocNo) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .entry(term.to_string())
            .or_default()
            .insert(docno.as_u32());
    }

    /// Postings for an exact term, `None` if the term does not occur
    pub fn postings(&self, field: &str, term: &str) -> Option<&RoaringBitmap> {
        self.fields.get(field)?.get(term)
    }
}
