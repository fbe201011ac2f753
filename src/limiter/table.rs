//! Keyed entry storage with a sampling index for bounded eviction.
//!
//! Entries live in a hash map, and every key also has a position in a dense
//! `Vec`. Eviction draws its candidates from that vector instead of from the
//! map's iteration order, so which entries a sweep inspects is explicit and
//! the cost of a sweep is bounded by the number of candidates, not by the
//! size of the table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::entry::LimitEntry;

/// How eviction candidates are drawn from the key ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Walk the ring with a persistent cursor
    #[default]
    RoundRobin,
    /// Pick uniformly at random
    Random,
}

struct Slot {
    entry: LimitEntry,
    position: usize,
}

enum Sampler {
    RoundRobin { cursor: usize },
    Random(StdRng),
}

/// The limiter's storage. Not synchronized; the owner holds the lock.
pub(crate) struct EntryTable {
    slots: HashMap<String, Slot>,
    ring: Vec<String>,
    sampler: Sampler,
    evicted_total: u64,
}

impl EntryTable {
    pub(crate) fn new(sampling: Sampling, seed: Option<u64>) -> Self {
        let sampler = match sampling {
            Sampling::RoundRobin => Sampler::RoundRobin { cursor: 0 },
            Sampling::Random => Sampler::Random(match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            }),
        };

        Self {
            slots: HashMap::new(),
            ring: Vec::new(),
            sampler,
            evicted_total: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.ring.len()
    }

    /// Entries removed by eviction sweeps since creation.
    pub(crate) fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub(crate) fn get(&self, key: &str) -> Option<&LimitEntry> {
        self.slots.get(key).map(|slot| &slot.entry)
    }

    /// Fetch the entry for `key`, inserting an empty one if absent.
    pub(crate) fn get_or_insert(&mut self, key: &str) -> &mut LimitEntry {
        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(occupied) => &mut occupied.into_mut().entry,
            Entry::Vacant(vacant) => {
                self.ring.push(key.to_owned());
                let slot = vacant.insert(Slot {
                    entry: LimitEntry::default(),
                    position: self.ring.len() - 1,
                });
                &mut slot.entry
            }
        }
    }

    /// Remove `key`. Returns whether it was present.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some(slot) = self.slots.remove(key) else {
            return false;
        };

        self.ring.swap_remove(slot.position);
        if let Some(moved) = self.ring.get(slot.position) {
            if let Some(moved_slot) = self.slots.get_mut(moved) {
                moved_slot.position = slot.position;
            }
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.ring.clear();
        if let Sampler::RoundRobin { cursor } = &mut self.sampler {
            *cursor = 0;
        }
    }

    /// Inspect up to `candidates` entries and remove those expired as of `now`.
    ///
    /// Entries whose clear window has not passed are never touched. Returns
    /// the number of entries removed.
    pub(crate) fn evict_expired(&mut self, candidates: usize, now: DateTime<Utc>) -> usize {
        let budget = candidates.min(self.ring.len());
        let mut evicted = 0;

        for _ in 0..budget {
            if self.ring.is_empty() {
                break;
            }
            let position = self.next_candidate();
            let key = &self.ring[position];
            let expired = self
                .slots
                .get(key)
                .map_or(false, |slot| slot.entry.is_expired(now));

            if expired {
                let key = key.clone();
                self.remove(&key);
                evicted += 1;
            } else if let Sampler::RoundRobin { cursor } = &mut self.sampler {
                // A removal swaps a fresh key into the cursor slot, so only
                // step past survivors.
                *cursor = position + 1;
            }
        }

        self.evicted_total += evicted as u64;
        evicted
    }

    fn next_candidate(&mut self) -> usize {
        let len = self.ring.len();
        match &mut self.sampler {
            Sampler::RoundRobin { cursor } => {
                if *cursor >= len {
                    *cursor = 0;
                }
                *cursor
            }
            Sampler::Random(rng) => rng.gen_range(0..len),
        }
    }
}
