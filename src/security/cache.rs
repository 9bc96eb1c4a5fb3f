//! Filter cache keyed by authority set and snapshot generations
//!
//! Optional layer above `SecurityFilterBuilder`. The builder never consults
//! it. Entries are only valid for the exact descriptor and content
//! generations they were built from; failed builds are never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::authority_query::AuthorityQuery;
use super::filter::{DocumentFilter, SecurityFilterBuilder, SecuritySnapshot};
use crate::segment::IndexReader;
use crate::Result;

/// Authorities are kept as the normalized list; they are opaque strings,
/// so no separator can be reserved to flatten them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    field: String,
    authorities: Vec<String>,
    descriptor_generation: u64,
    content_generation: u64,
}

/// Hit/miss counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct FilterCache {
    entries: RwLock<HashMap<CacheKey, Arc<DocumentFilter>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached filter for the authority set, building it on a miss
    pub fn get_or_build<D, C, I, S>(
        &self,
        builder: &SecurityFilterBuilder,
        authorities: I,
        snapshot: SecuritySnapshot<'_, D, C>,
    ) -> Result<Arc<DocumentFilter>>
    where
        D: IndexReader,
        C: IndexReader,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = AuthorityQuery::new(
            builder.settings().descriptor_authority_field.as_str(),
            authorities,
        );
        let key = CacheKey {
            field: query.field.clone(),
            authorities: query.authorities().to_vec(),
            descriptor_generation: snapshot.descriptors.generation(),
            content_generation: snapshot.content.generation(),
        };

        if let Some(cached) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let filter = Arc::new(builder.build_filter(query.authorities().iter().cloned(), snapshot)?);
        self.entries.write().insert(key, filter.clone());
        Ok(filter)
    }

    /// Drop entries built from a descriptor or content generation older
    /// than the given ones
    pub fn invalidate_before(&self, descriptor_generation: u64, content_generation: u64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| {
            key.descriptor_generation >= descriptor_generation
                && key.content_generation >= content_generation
        });
        let removed = before - entries.len();
        if removed > 0 {
            debug!(
                removed,
                descriptor_generation, content_generation, "invalidated cached security filters"
            );
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new()
    }
}
