//! Numeric doc values
//!
//! The filter needs exactly two columns: descriptor ids on the descriptor
//! index and descriptor references on the content index. Both are
//! single-valued i64 columns indexed by local docno.

use std::collections::HashMap;

use roaring::RoaringBitmap;

use super::types::DocNo;
use crate::Result;

/// Read access to one numeric column of one segment
///
/// Implementations backed by storage report I/O or corruption as
/// `AclShardError::SegmentRead`; callers must propagate, never skip.
pub trait NumericDocValues: Send + Sync {
    /// Value for a docno, `None` when the document has no value
    fn get(&self, docno: DocNo) -> Result<Option<i64>>;

    /// Number of documents covered by the column
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory numeric column
#[derive(Clone, Debug, Default)]
pub struct NumericColumn {
    values: Vec<i64>,
    /// Docnos that carry a value; `values` holds 0 elsewhere
    present: RoaringBitmap,
}

impl NumericColumn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the value of the next docno
    pub fn push(&mut self, value: Option<i64>) {
        if let Some(v) = value {
            self.present.insert(self.values.len() as u32);
            self.values.push(v);
        } else {
            self.values.push(0);
        }
    }

    pub fn has_value(&self, docno: DocNo) -> bool {
        self.present.contains(docno.as_u32())
    }

    /// Number of documents carrying a value
    pub fn value_count(&self) -> u64 {
        self.present.len()
    }
}

impl FromIterator<Option<i64>> for NumericColumn {
    fn from_iter<I: IntoIterator<Item = Option<i64>>>(iter: I) -> Self {
        let mut column = NumericColumn::new();
        for value in iter {
            column.push(value);
        }
        column
    }
}

impl NumericDocValues for NumericColumn {
    fn get(&self, docno: DocNo) -> Result<Option<i64>> {
        if !self.has_value(docno) {
            return Ok(None);
        }
        Ok(self.values.get(docno.as_usize()).copied())
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Numeric columns of one segment, keyed by field name
#[derive(Clone, Debug, Default)]
pub struct NumericFields {
    columns: HashMap<String, NumericColumn>,
}

impl NumericFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, column: NumericColumn) {
        self.columns.insert(field.into(), column);
    }

    pub fn column(&self, field: &str) -> Option<&NumericColumn> {
        self.columns.get(field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_column() {
        let col: NumericColumn = [Some(7), None, Some(0)].into_iter().collect();

        assert_eq!(col.len(), 3);
        assert_eq!(col.value_count(), 2);
        assert_eq!(col.get(DocNo(0)).unwrap(), Some(7));
        assert_eq!(col.get(DocNo(1)).unwrap(), None);
        // zero is a real value, not a hole
        assert_eq!(col.get(DocNo(2)).unwrap(), Some(0));
        assert!(!col.has_value(DocNo(1)));
    }

    #[test]
    fn test_past_end_is_missing() {
        let mut col = NumericColumn::new();
        col.push(Some(1));
        assert_eq!(col.get(DocNo(5)).unwrap(), None);
    }

    #[test]
    fn test_numeric_fields() {
        let mut fields = NumericFields::new();
        fields.insert("acl_id", [Some(3)].into_iter().collect());

        assert!(fields.column("acl_id").is_some());
        assert!(fields.column("missing").is_none());
        assert_eq!(fields.len(), 1);
    }
}
