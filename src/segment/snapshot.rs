//! Point-in-time views over live segments
//!
//! An `IndexSnapshot` never changes after construction. New segments are
//! made visible by publishing a new snapshot through `SnapshotHolder`,
//! which bumps the generation so that derived data (filters, caches) built
//! against the old snapshot can be recognised as stale.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use super::reader::{IndexReader, LeafReader, SegmentReader};
use super::types::SegmentId;

/// Immutable ordered list of segments
#[derive(Clone, Debug, Default)]
pub struct IndexSnapshot {
    generation: u64,
    segments: Vec<Arc<SegmentReader>>,
}

impl IndexSnapshot {
    pub fn new(generation: u64, segments: Vec<Arc<SegmentReader>>) -> Self {
        Self {
            generation,
            segments,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Snapshot with one more segment appended, at the next generation
    pub fn with_segment(&self, segment: Arc<SegmentReader>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self::new(self.generation + 1, segments)
    }

    /// Snapshot without the given segment, at the next generation
    pub fn without_segment(&self, id: SegmentId) -> Self {
        let segments = self
            .segments
            .iter()
            .filter(|s| s.segment_id() != id)
            .cloned()
            .collect();
        Self::new(self.generation + 1, segments)
    }
}

impl IndexReader for IndexSnapshot {
    type Leaf = Arc<SegmentReader>;

    fn generation(&self) -> u64 {
        self.generation
    }

    fn leaves(&self) -> &[Self::Leaf] {
        &self.segments
    }
}

/// Thread-safe holder publishing snapshots atomically
///
/// Readers take a cheap `Arc` to the current snapshot and keep using it for
/// the whole query, even if a newer one is published meanwhile.
pub struct SnapshotHolder {
    inner: ArcSwap<IndexSnapshot>,
    /// Serializes publishers; readers never take it
    write_lock: Mutex<()>,
}

impl SnapshotHolder {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        Self {
            inner: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<IndexSnapshot> {
        self.inner.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.inner.load().generation()
    }

    /// Publish a new snapshot derived from the current one
    pub fn update<F>(&self, f: F) -> Arc<IndexSnapshot>
    where
        F: FnOnce(&IndexSnapshot) -> IndexSnapshot,
    {
        let _guard = self.write_lock.lock();
        let previous = self.inner.load_full();
        let next = Arc::new(f(&previous));
        self.inner.store(next.clone());
        debug!(
            from = previous.generation(),
            to = next.generation(),
            segments = next.segment_count(),
            "published snapshot"
        );
        next
    }

    /// Append a sealed segment
    pub fn add_segment(&self, segment: SegmentReader) -> Arc<IndexSnapshot> {
        let segment = Arc::new(segment);
        self.update(|current| current.with_segment(segment))
    }

    /// Drop a segment (e.g. after it was merged away)
    pub fn remove_segment(&self, id: SegmentId) -> Arc<IndexSnapshot> {
        self.update(|current| current.without_segment(id))
    }
}

impl Default for SnapshotHolder {
    fn default() -> Self {
        Self::new(IndexSnapshot::empty())
    }
}
