//! Authority query - matches descriptors listing any of the given authorities

use roaring::{RoaringBitmap, RoaringTreemap};
use serde::{Deserialize, Serialize};

use crate::segment::{DocNo, IndexReader, LeafReader};
use crate::Result;

/// Disjunctive exact-term match over the descriptor authority field
///
/// Equivalent to a boolean OR of one term query per authority, evaluated in a
/// single pass per segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityQuery {
    /// Field listing a descriptor's authorities
    pub field: String,
    /// Authorities, sorted and deduplicated
    authorities: Vec<String>,
}

impl AuthorityQuery {
    pub fn new<I, S>(field: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut authorities: Vec<String> = authorities.into_iter().map(Into::into).collect();
        authorities.sort();
        authorities.dedup();
        Self {
            field: field.into(),
            authorities,
        }
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }

    /// Matching docnos of a single segment
    pub fn execute_leaf<L: LeafReader>(&self, leaf: &L) -> Result<RoaringBitmap> {
        let mut matched = RoaringBitmap::new();
        for authority in &self.authorities {
            if let Some(postings) = leaf.postings(&self.field, authority)? {
                matched |= postings;
            }
        }
        Ok(matched)
    }

    /// Matching global ordinals across all segments, ascending
    pub fn execute<R: IndexReader>(&self, reader: &R) -> Result<RoaringTreemap> {
        let mut ordinals = RoaringTreemap::new();
        if self.is_empty() {
            return Ok(ordinals);
        }

        let mut base = 0u64;
        for leaf in reader.leaves() {
            for docno in self.execute_leaf(leaf)?.iter() {
                ordinals.insert(DocNo(docno).to_global(base));
            }
            base += leaf.doc_count() as u64;
        }
        Ok(ordinals)
    }
}
