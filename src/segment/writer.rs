//! Segment writer
//!
//! Buffers documents and seals them into an immutable `SegmentReader`.
//! Sealing is the only way a segment comes into existence; once sealed it is
//! never modified.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::docvalues::NumericFields;
use super::reader::SegmentReader;
use super::terms::TermIndex;
use super::types::{DocNo, SegmentId, SegmentMeta};

/// A document as handed to the writer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Single-valued numeric doc values
    #[serde(default)]
    pub numerics: BTreeMap<String, i64>,
    /// Multivalued exact-match keyword terms
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numeric(mut self, field: impl Into<String>, value: i64) -> Self {
        self.numerics.insert(field.into(), value);
        self
    }

    pub fn keyword(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.keywords.entry(field.into()).or_default().push(term.into());
        self
    }
}

/// Accumulates documents for one segment
#[derive(Debug)]
pub struct SegmentWriter {
    id: SegmentId,
    rows: Vec<BTreeMap<String, i64>>,
    terms: TermIndex,
}

impl SegmentWriter {
    pub fn new(id: SegmentId) -> Self {
        Self {
            id,
            rows: Vec::new(),
            terms: TermIndex::new(),
        }
    }

    /// Add a document and return its local docno
    pub fn add_document(&mut self, doc: IndexDocument) -> DocNo {
        let docno = DocNo(self.rows.len() as u32);
        for (field, terms) in &doc.keywords {
            for term in terms {
                self.terms.insert(field, term, docno);
            }
        }
        self.rows.push(doc.numerics);
        docno
    }

    pub fn doc_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Seal the buffered documents into an immutable segment
    pub fn seal(self) -> SegmentReader {
        let doc_count = self.rows.len();
        let fields: BTreeSet<&String> = self.rows.iter().flat_map(|row| row.keys()).collect();

        let mut numerics = NumericFields::new();
        for field in fields {
            let column = self.rows.iter().map(|row| row.get(field).copied()).collect();
            numerics.insert(field.as_str(), column);
        }

        debug!(segment = %self.id, doc_count, "sealed segment");

        SegmentReader::from_memory(
            SegmentMeta::new(self.id, doc_count as u32),
            numerics,
            self.terms,
        )
    }
}
