//! Security filter construction
//!
//! Building a filter runs in two phases:
//! 1. Resolve the descriptor ids readable by the authority set: a disjunctive
//!    authority match over the descriptor index, walking matches in ascending
//!    ordinal order and collecting each descriptor's id.
//! 2. Materialize one dense bitmask per content segment, setting the bit of
//!    every document whose descriptor id was collected in phase 1.
//!
//! Any read failure aborts the build. A partially built filter is never
//! returned.

use roaring::RoaringBitmap;
use tracing::{debug, trace};

use super::authority_query::AuthorityQuery;
use super::bitset::FixedBitSet;
use super::identifier_set::IdentifierSet;
use crate::config::FilterSettings;
use crate::segment::{
    DocNo, GlobalOrdinal, IndexReader, LeafReader, NumericDocValues, SegmentCursor, SegmentId,
};
use crate::{AclShardError, Result};

/// The two sub-indices a filter is computed from
pub struct SecuritySnapshot<'a, D, C = D> {
    /// Security descriptors: id doc value + multivalued authority terms
    pub descriptors: &'a D,
    /// Content records: descriptor-id doc value
    pub content: &'a C,
}

impl<'a, D, C> SecuritySnapshot<'a, D, C> {
    pub fn new(descriptors: &'a D, content: &'a C) -> Self {
        Self {
            descriptors,
            content,
        }
    }
}

impl<D, C> Clone for SecuritySnapshot<'_, D, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, C> Copy for SecuritySnapshot<'_, D, C> {}

/// Visibility bitmask for one content segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentFilter {
    pub segment_id: SegmentId,
    /// Global ordinal of the segment's first document
    pub base: GlobalOrdinal,
    pub bits: FixedBitSet,
}

/// Per-segment visibility bitmasks for one authority set and one content
/// snapshot generation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentFilter {
    generation: u64,
    /// Unset when materialized from a caller-supplied identifier set
    descriptor_generation: Option<u64>,
    segments: Vec<SegmentFilter>,
}

impl DocumentFilter {
    /// Content generation the filter was built against
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Descriptor generation the visible set was resolved from
    pub fn descriptor_generation(&self) -> Option<u64> {
        self.descriptor_generation
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[SegmentFilter] {
        &self.segments
    }

    /// Bitmask of the i-th content segment
    pub fn segment(&self, index: usize) -> Option<&FixedBitSet> {
        self.segments.get(index).map(|s| &s.bits)
    }

    /// Whether a local document of a segment is visible
    pub fn is_visible_local(&self, segment: usize, docno: DocNo) -> bool {
        self.segment(segment)
            .map(|bits| bits.contains(docno.as_usize()))
            .unwrap_or(false)
    }

    /// Whether a global ordinal is visible; ordinals outside the snapshot
    /// are not
    pub fn is_visible(&self, ordinal: GlobalOrdinal) -> bool {
        let idx = self
            .segments
            .partition_point(|s| s.base + s.bits.len() as u64 <= ordinal);
        match self.segments.get(idx) {
            Some(s) if ordinal >= s.base => s.bits.contains((ordinal - s.base) as usize),
            _ => false,
        }
    }

    /// Total visible documents
    pub fn visible_count(&self) -> usize {
        self.segments.iter().map(|s| s.bits.count_ones()).sum()
    }

    pub fn is_all_clear(&self) -> bool {
        self.segments.iter().all(|s| s.bits.is_clear())
    }

    /// Restrict another query's matches within one segment to visible docs
    pub fn and_with(&self, segment: usize, matches: &RoaringBitmap) -> RoaringBitmap {
        match self.segment(segment) {
            Some(bits) => bits.to_roaring() & matches,
            None => RoaringBitmap::new(),
        }
    }

    /// Fails if the filter is applied to a different content generation
    pub fn check_generation<R: IndexReader>(&self, content: &R) -> Result<()> {
        if content.generation() != self.generation {
            return Err(AclShardError::StaleFilter {
                index: "content",
                expected: self.generation,
                actual: content.generation(),
            });
        }
        Ok(())
    }

    /// Fails if either index moved since the filter was built
    pub fn check_snapshot<D, C>(&self, snapshot: SecuritySnapshot<'_, D, C>) -> Result<()>
    where
        D: IndexReader,
        C: IndexReader,
    {
        if let Some(expected) = self.descriptor_generation {
            let actual = snapshot.descriptors.generation();
            if actual != expected {
                return Err(AclShardError::StaleFilter {
                    index: "descriptor",
                    expected,
                    actual,
                });
            }
        }
        self.check_generation(snapshot.content)
    }
}

/// Computes `DocumentFilter`s for authority sets
#[derive(Clone, Debug)]
pub struct SecurityFilterBuilder {
    settings: FilterSettings,
}

impl SecurityFilterBuilder {
    pub fn new(settings: FilterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Phase 1: ids of every descriptor listing at least one authority
    pub fn visible_descriptors<R, I, S>(&self, authorities: I, descriptors: &R) -> Result<IdentifierSet>
    where
        R: IndexReader,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = AuthorityQuery::new(&self.settings.descriptor_authority_field, authorities);
        if query.is_empty() {
            return Ok(IdentifierSet::empty());
        }

        let ordinals = query.execute(descriptors)?;
        if ordinals.is_empty() {
            return Ok(IdentifierSet::empty());
        }

        let mut visible =
            IdentifierSet::with_expected_cardinality(ordinals.len() as usize, &self.settings);
        let mut cursor = SegmentCursor::for_field(
            descriptors.leaves(),
            &self.settings.descriptor_id_field,
        )?;

        for ordinal in ordinals.iter() {
            match cursor.value(ordinal)? {
                Some(id) if id >= 0 => visible.add(id as u64),
                Some(id) => {
                    let (segment, docno) = cursor.locate(ordinal)?;
                    return Err(AclShardError::segment_read(
                        segment,
                        format!("negative descriptor id {} at docno {}", id, docno.as_u32()),
                    ));
                }
                None => trace!(ordinal, "descriptor without id skipped"),
            }
        }

        Ok(visible)
    }

    /// Phase 2: one bitmask per content segment
    pub fn materialize<R: IndexReader>(&self, visible: &IdentifierSet, content: &R) -> Result<DocumentFilter> {
        let mut segments = Vec::with_capacity(content.leaves().len());
        let mut base: GlobalOrdinal = 0;

        for (index, leaf) in content.leaves().iter().enumerate() {
            let doc_count = leaf.doc_count();
            let mut bits = FixedBitSet::new(doc_count as usize);

            if !visible.is_empty() {
                if let Some(values) = leaf.numeric_doc_values(&self.settings.content_descriptor_field)? {
                    fill_segment(index, values, visible, &mut bits)?;
                }
            }

            segments.push(SegmentFilter {
                segment_id: leaf.segment_id(),
                base,
                bits,
            });
            base += doc_count as u64;
        }

        Ok(DocumentFilter {
            generation: content.generation(),
            descriptor_generation: None,
            segments,
        })
    }

    /// Compute the document filter for an authority set
    pub fn build_filter<D, C, I, S>(
        &self,
        authorities: I,
        snapshot: SecuritySnapshot<'_, D, C>,
    ) -> Result<DocumentFilter>
    where
        D: IndexReader,
        C: IndexReader,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let visible = self.visible_descriptors(authorities, snapshot.descriptors)?;
        let mut filter = self.materialize(&visible, snapshot.content)?;
        filter.descriptor_generation = Some(snapshot.descriptors.generation());

        debug!(
            visible_descriptors = visible.len(),
            dense = visible.is_dense(),
            segments = filter.segment_count(),
            visible_docs = filter.visible_count(),
            generation = filter.generation(),
            "built security filter"
        );
        Ok(filter)
    }
}

fn fill_segment(
    segment: usize,
    values: &dyn NumericDocValues,
    visible: &IdentifierSet,
    bits: &mut FixedBitSet,
) -> Result<()> {
    for docno in 0..bits.len() {
        let value = values.get(DocNo(docno as u32)).map_err(|e| match e {
            AclShardError::SegmentRead { reason, .. } => AclShardError::segment_read(segment, reason),
            other => other,
        })?;
        if let Some(id) = value {
            if id >= 0 && visible.contains(id as u64) {
                bits.insert(docno);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{IndexDocument, IndexSnapshot, SegmentWriter};
    use std::sync::Arc;

    fn descriptor(id: i64, authorities: &[&str]) -> IndexDocument {
        authorities
            .iter()
            .fold(IndexDocument::new().numeric("acl_id", id), |doc, a| {
                doc.keyword("authority", *a)
            })
    }

    fn content(acl_id: i64) -> IndexDocument {
        IndexDocument::new().numeric("acl_id", acl_id)
    }

    fn index(generation: u64, segments: Vec<Vec<IndexDocument>>) -> IndexSnapshot {
        let readers = segments
            .into_iter()
            .enumerate()
            .map(|(i, docs)| {
                let mut writer = SegmentWriter::new(SegmentId(i as u64));
                for doc in docs {
                    writer.add_document(doc);
                }
                Arc::new(writer.seal())
            })
            .collect();
        IndexSnapshot::new(generation, readers)
    }

    fn builder() -> SecurityFilterBuilder {
        SecurityFilterBuilder::new(FilterSettings::default()).unwrap()
    }

    #[test]
    fn test_sales_group_sees_first_two_documents() {
        let descriptors = index(1, vec![vec![descriptor(7, &["GROUP_sales"])]]);
        let content = index(4, vec![vec![content(7), content(7), content(9)]]);

        let filter = builder()
            .build_filter(["GROUP_sales"], SecuritySnapshot::new(&descriptors, &content))
            .unwrap();

        assert_eq!(filter.segment_count(), 1);
        assert!(filter.is_visible(0));
        assert!(filter.is_visible(1));
        assert!(!filter.is_visible(2));
        assert_eq!(filter.visible_count(), 2);
        assert_eq!(filter.generation(), 4);
    }

    #[test]
    fn test_visible_descriptors_across_segments() {
        let descriptors = index(
            1,
            vec![
                vec![descriptor(1, &["alice"]), descriptor(2, &["bob"])],
                vec![],
                vec![descriptor(3, &["alice", "bob"]), descriptor(4, &["carol"])],
            ],
        );

        let visible = builder().visible_descriptors(["alice"], &descriptors).unwrap();
        assert_eq!(visible.iter().collect::<Vec<_>>(), vec![1, 3]);

        let visible = builder()
            .visible_descriptors(["bob", "carol"], &descriptors)
            .unwrap();
        assert_eq!(visible.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_no_authorities_yields_all_clear_filter() {
        let descriptors = index(1, vec![vec![descriptor(1, &["alice"])]]);
        let content = index(1, vec![vec![content(1)], vec![content(1), content(1)]]);

        let filter = builder()
            .build_filter(Vec::<String>::new(), SecuritySnapshot::new(&descriptors, &content))
            .unwrap();
        assert_eq!(filter.segment_count(), 2);
        assert_eq!(filter.segment(1).unwrap().len(), 2);
        assert!(filter.is_all_clear());
    }

    #[test]
    fn test_segment_without_descriptor_field_is_clear() {
        let descriptors = index(1, vec![vec![descriptor(1, &["alice"])]]);
        let content = index(
            1,
            vec![
                vec![IndexDocument::new(), IndexDocument::new()],
                vec![content(1)],
            ],
        );

        let filter = builder()
            .build_filter(["alice"], SecuritySnapshot::new(&descriptors, &content))
            .unwrap();
        assert!(filter.segment(0).unwrap().is_clear());
        assert!(filter.is_visible(2));
        assert!(!filter.is_visible(3));
    }

    #[test]
    fn test_negative_descriptor_id_fails() {
        let descriptors = index(1, vec![vec![descriptor(-5, &["alice"])]]);
        let result = builder().visible_descriptors(["alice"], &descriptors);
        assert!(matches!(result, Err(AclShardError::SegmentRead { segment: 0, .. })));
    }

    #[test]
    fn test_dense_representation_gives_same_filter() {
        let descriptors = index(
            1,
            vec![(0..50).map(|id| descriptor(id, &["GROUP_all"])).collect()],
        );
        let content = index(1, vec![(0..100).map(content).collect()]);
        let snapshot = SecuritySnapshot::new(&descriptors, &content);

        let sparse = builder().build_filter(["GROUP_all"], snapshot).unwrap();
        let dense_builder =
            SecurityFilterBuilder::new(FilterSettings::default().with_dense_threshold(8)).unwrap();
        assert!(dense_builder
            .visible_descriptors(["GROUP_all"], &descriptors)
            .unwrap()
            .is_dense());
        let dense = dense_builder.build_filter(["GROUP_all"], snapshot).unwrap();

        assert_eq!(sparse, dense);
        assert_eq!(dense.visible_count(), 50);
    }

    #[test]
    fn test_and_with_and_generation_check() {
        let descriptors = index(1, vec![vec![descriptor(7, &["alice"])]]);
        let current = index(2, vec![vec![content(7), content(8), content(7)]]);
        let filter = builder()
            .build_filter(["alice"], SecuritySnapshot::new(&descriptors, &current))
            .unwrap();

        let matches: RoaringBitmap = [0u32, 1, 2].into_iter().collect();
        assert_eq!(filter.and_with(0, &matches).iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(filter.and_with(5, &matches).is_empty());
        assert!(filter.is_visible_local(0, DocNo(2)));

        assert!(filter.check_generation(&current).is_ok());
        let newer = index(3, vec![vec![content(7)]]);
        assert!(matches!(
            filter.check_generation(&newer),
            Err(AclShardError::StaleFilter { index: "content", expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_descriptor_publish_makes_filter_stale() {
        let descriptors = index(1, vec![vec![descriptor(7, &["alice"])]]);
        let content = index(2, vec![vec![content(7)]]);
        let filter = builder()
            .build_filter(["alice"], SecuritySnapshot::new(&descriptors, &content))
            .unwrap();
        assert_eq!(filter.descriptor_generation(), Some(1));
        assert!(filter
            .check_snapshot(SecuritySnapshot::new(&descriptors, &content))
            .is_ok());

        // alice loses access; content is untouched
        let republished = index(5, vec![vec![descriptor(7, &["bob"])]]);
        assert!(filter.check_generation(&content).is_ok());
        assert!(matches!(
            filter.check_snapshot(SecuritySnapshot::new(&republished, &content)),
            Err(AclShardError::StaleFilter { index: "descriptor", expected: 1, actual: 5 })
        ));
    }

    #[test]
    fn test_materialized_filter_skips_descriptor_check() {
        let descriptors = index(9, vec![vec![descriptor(7, &["alice"])]]);
        let content = index(2, vec![vec![content(7)]]);
        let mut visible = IdentifierSet::new(&FilterSettings::default());
        visible.add(7);

        let filter = builder().materialize(&visible, &content).unwrap();
        assert_eq!(filter.descriptor_generation(), None);
        assert!(filter
            .check_snapshot(SecuritySnapshot::new(&descriptors, &content))
            .is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let result = SecurityFilterBuilder::new(FilterSettings::default().with_dense_threshold(0));
        assert!(matches!(result, Err(AclShardError::Configuration(_))));

        let result = SecurityFilterBuilder::new(
            FilterSettings::default()
                .with_dense_threshold(1)
                .with_universe_upper_bound(u64::MAX),
        );
        assert!(matches!(result, Err(AclShardError::Configuration(_))));
    }
}
