//! Adaptive set of descriptor ids
//!
//! Starts as a sorted vector (binary-search membership) and upgrades to a
//! dense bitmask over `[0, universe_upper_bound)` once its cardinality
//! reaches the configured threshold. Ids at or above the universe bound are
//! kept in a sorted overflow list, so the upgrade never drops an id.

use super::bitset::FixedBitSet;
use crate::config::{FilterSettings, MAX_UNIVERSE_UPPER_BOUND};
use crate::segment::DescriptorId;

#[derive(Clone, Debug)]
enum Repr {
    /// Distinguished empty set; owns no storage
    Empty,
    Sparse {
        ids: Vec<DescriptorId>,
        threshold: usize,
        universe: u64,
    },
    Dense {
        bits: FixedBitSet,
        overflow: Vec<DescriptorId>,
        len: usize,
    },
}

/// Set of security descriptor ids visible to an authority set
#[derive(Clone, Debug)]
pub struct IdentifierSet {
    repr: Repr,
}

impl IdentifierSet {
    /// The empty set. `contains` is false for every id.
    pub fn empty() -> Self {
        Self { repr: Repr::Empty }
    }

    /// Sparse set that upgrades per `settings`
    pub fn new(settings: &FilterSettings) -> Self {
        Self {
            repr: Repr::Sparse {
                ids: Vec::new(),
                threshold: settings.dense_threshold,
                universe: settings.universe_upper_bound,
            },
        }
    }

    /// Set sized for an expected cardinality; starts dense when the
    /// expectation already reaches the threshold
    pub fn with_expected_cardinality(expected: usize, settings: &FilterSettings) -> Self {
        if expected >= settings.dense_threshold {
            Self {
                repr: Self::dense(settings.universe_upper_bound, &[]),
            }
        } else {
            Self {
                repr: Repr::Sparse {
                    ids: Vec::with_capacity(expected),
                    threshold: settings.dense_threshold,
                    universe: settings.universe_upper_bound,
                },
            }
        }
    }

    fn dense(universe: u64, ids: &[DescriptorId]) -> Repr {
        // Unvalidated bounds get no bitmask; every id then lives in overflow
        let width = usize::try_from(universe)
            .ok()
            .filter(|_| universe <= MAX_UNIVERSE_UPPER_BOUND)
            .unwrap_or(0);
        let mut bits = FixedBitSet::new(width);
        let mut overflow = Vec::new();
        for &id in ids {
            if id < width as u64 {
                bits.insert(id as usize);
            } else {
                overflow.push(id);
            }
        }
        // ids come from a sorted, deduplicated vector
        Repr::Dense {
            bits,
            overflow,
            len: ids.len(),
        }
    }

    /// Insert an id. Idempotent.
    pub fn add(&mut self, id: DescriptorId) {
        match &mut self.repr {
            Repr::Empty => {
                let defaults = FilterSettings::default();
                self.repr = Repr::Sparse {
                    ids: vec![id],
                    threshold: defaults.dense_threshold,
                    universe: defaults.universe_upper_bound,
                };
                self.maybe_upgrade();
            }
            Repr::Sparse { ids, .. } => {
                if let Err(pos) = ids.binary_search(&id) {
                    ids.insert(pos, id);
                    self.maybe_upgrade();
                }
            }
            Repr::Dense {
                bits,
                overflow,
                len,
            } => {
                if id < bits.len() as u64 {
                    if !bits.contains(id as usize) {
                        bits.insert(id as usize);
                        *len += 1;
                    }
                } else if let Err(pos) = overflow.binary_search(&id) {
                    overflow.insert(pos, id);
                    *len += 1;
                }
            }
        }
    }

    fn maybe_upgrade(&mut self) {
        if let Repr::Sparse {
            ids,
            threshold,
            universe,
        } = &self.repr
        {
            if ids.len() >= *threshold {
                self.repr = Self::dense(*universe, ids);
            }
        }
    }

    pub fn contains(&self, id: DescriptorId) -> bool {
        match &self.repr {
            Repr::Empty => false,
            Repr::Sparse { ids, .. } => ids.binary_search(&id).is_ok(),
            Repr::Dense { bits, overflow, .. } => {
                if id < bits.len() as u64 {
                    bits.contains(id as usize)
                } else {
                    overflow.binary_search(&id).is_ok()
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::Sparse { ids, .. } => ids.len(),
            Repr::Dense { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the set has switched to the dense bitmask
    pub fn is_dense(&self) -> bool {
        matches!(self.repr, Repr::Dense { .. })
    }

    /// Ids in ascending order
    pub fn iter(&self) -> Box<dyn Iterator<Item = DescriptorId> + '_> {
        match &self.repr {
            Repr::Empty => Box::new(std::iter::empty()),
            Repr::Sparse { ids, .. } => Box::new(ids.iter().copied()),
            Repr::Dense { bits, overflow, .. } => Box::new(
                bits.ones()
                    .map(|i| i as DescriptorId)
                    .chain(overflow.iter().copied()),
            ),
        }
    }

    /// Bytes of backing storage
    pub fn heap_bytes(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::Sparse { ids, .. } => ids.capacity() * std::mem::size_of::<DescriptorId>(),
            Repr::Dense { bits, overflow, .. } => {
                bits.heap_bytes() + overflow.capacity() * std::mem::size_of::<DescriptorId>()
            }
        }
    }
}
