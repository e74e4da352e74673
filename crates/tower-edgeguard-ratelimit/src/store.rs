//! Request-fingerprint storage behind the sliding window.
//!
//! The store is the state substrate: per-key timestamp lists, bounded by
//! an LRU index, with one atomic check-and-add as the canonical
//! operation. The bundled [`MemoryStore`] is process-local; the trait is
//! the seam a remote backend would implement.

use crate::error::StoreError;
use crate::lru::LruIndex;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::SystemTime;

/// Advisory cost constants for [`RateLimitStore::memory_usage`]. The
/// number feeds pressure signals, it is not an allocator measurement.
const KEY_OVERHEAD_BYTES: usize = 120;
const TIMESTAMP_BYTES: usize = 16;

/// Result of the atomic check-and-add operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckAndAdd {
    pub allowed: bool,
    /// In-window count after the add on allow, the current in-window
    /// count on deny.
    pub count: usize,
    /// Earliest in-window event, when the backend can report it. Drives
    /// the precise `Retry-After` on denial.
    pub oldest: Option<SystemTime>,
}

/// Persistence of request fingerprints per key.
///
/// All methods may fail only if the underlying backend fails; the
/// in-memory implementation is infallible. Errors are transient to
/// callers and feed the circuit breaker.
pub trait RateLimitStore: Send + Sync {
    /// Appends an event for `key`.
    fn add_request(&self, key: &str, timestamp: SystemTime) -> Result<(), StoreError>;

    /// Counts events strictly after `cutoff`.
    fn request_count(&self, key: &str, cutoff: SystemTime) -> Result<usize, StoreError>;

    /// Atomically counts in-window events and, if under `limit`,
    /// records the new one.
    ///
    /// The default implementation is the legacy count-then-add split,
    /// which has an inherent TOCTOU race between the read and the
    /// write; backends that can make the pair a single critical section
    /// must override it. Within an overridden call no other store
    /// operation for any key may interleave.
    fn check_and_add(
        &self,
        key: &str,
        timestamp: SystemTime,
        cutoff: SystemTime,
        limit: usize,
    ) -> Result<CheckAndAdd, StoreError> {
        let count = self.request_count(key, cutoff)?;
        if count < limit {
            self.add_request(key, timestamp)?;
            Ok(CheckAndAdd {
                allowed: true,
                count: count + 1,
                oldest: None,
            })
        } else {
            Ok(CheckAndAdd {
                allowed: false,
                count,
                oldest: None,
            })
        }
    }

    /// Drops events at or before `cutoff` and keys that become empty.
    /// Returns the number of keys removed. Driven by an external
    /// periodic trigger; the store owns no timer.
    fn cleanup(&self, cutoff: SystemTime) -> Result<usize, StoreError>;

    /// Number of live keys.
    fn key_count(&self) -> usize;

    /// Estimated memory footprint in bytes, from fixed per-entry and
    /// per-timestamp costs.
    fn memory_usage(&self) -> usize;
}

struct KeyEntry {
    timestamps: VecDeque<SystemTime>,
    node: usize,
}

impl KeyEntry {
    fn prune(&mut self, cutoff: SystemTime) {
        while let Some(&front) = self.timestamps.front() {
            if front <= cutoff {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn in_window(&self, cutoff: SystemTime) -> usize {
        self.timestamps.iter().filter(|&&ts| ts > cutoff).count()
    }
}

struct StoreInner {
    entries: HashMap<String, KeyEntry>,
    lru: LruIndex,
}

/// In-memory [`RateLimitStore`] bounded to `max_keys` by LRU eviction.
///
/// One `RwLock` covers the key map, every per-key timestamp list, and
/// the LRU index: count-only reads share the read lock, every mutation
/// takes the write lock, and `check_and_add` is a single write-locked
/// critical section — the TOCTOU defense.
pub struct MemoryStore {
    max_keys: usize,
    evict_batch: usize,
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    /// Creates a store bounded to `max_keys` (minimum 1). When an
    /// insert would exceed the bound, a batch of 10% of `max_keys`
    /// (minimum 1) is evicted from the LRU tail first.
    pub fn new(max_keys: usize) -> Self {
        let max_keys = max_keys.max(1);
        Self {
            max_keys,
            evict_batch: (max_keys / 10).max(1),
            inner: RwLock::new(StoreInner {
                entries: HashMap::new(),
                lru: LruIndex::new(),
            }),
        }
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Finds `key`'s entry, inserting (and evicting at capacity) when
    /// new, and marks it most recently used.
    fn touch_or_insert<'a>(
        entries: &'a mut HashMap<String, KeyEntry>,
        lru: &mut LruIndex,
        max_keys: usize,
        evict_batch: usize,
        key: &str,
    ) -> &'a mut KeyEntry {
        if !entries.contains_key(key) && entries.len() >= max_keys {
            let mut evicted = 0;
            for _ in 0..evict_batch {
                match lru.pop_tail() {
                    Some(victim) => {
                        entries.remove(&victim);
                        evicted += 1;
                    }
                    None => break,
                }
            }
            tracing::debug!(evicted, "rate-limit store at capacity, evicted LRU keys");

            #[cfg(feature = "metrics")]
            metrics::counter!("edgeguard_store_evictions_total").increment(evicted as u64);
        }

        let entry = entries.entry(key.to_owned()).or_insert_with(|| KeyEntry {
            timestamps: VecDeque::new(),
            node: lru.push_front(key.to_owned()),
        });
        lru.touch(entry.node);
        entry
    }
}

impl RateLimitStore for MemoryStore {
    fn add_request(&self, key: &str, timestamp: SystemTime) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let StoreInner { entries, lru } = &mut *inner;
        let entry = Self::touch_or_insert(entries, lru, self.max_keys, self.evict_batch, key);
        entry.timestamps.push_back(timestamp);
        Ok(())
    }

    fn request_count(&self, key: &str, cutoff: SystemTime) -> Result<usize, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .entries
            .get(key)
            .map(|entry| entry.in_window(cutoff))
            .unwrap_or(0))
    }

    fn check_and_add(
        &self,
        key: &str,
        timestamp: SystemTime,
        cutoff: SystemTime,
        limit: usize,
    ) -> Result<CheckAndAdd, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let StoreInner { entries, lru } = &mut *inner;
        let entry = Self::touch_or_insert(entries, lru, self.max_keys, self.evict_batch, key);
        entry.prune(cutoff);
        let count = entry.timestamps.len();
        if count < limit {
            entry.timestamps.push_back(timestamp);
            Ok(CheckAndAdd {
                allowed: true,
                count: count + 1,
                oldest: entry.timestamps.front().copied(),
            })
        } else {
            Ok(CheckAndAdd {
                allowed: false,
                count,
                oldest: entry.timestamps.front().copied(),
            })
        }
    }

    fn cleanup(&self, cutoff: SystemTime) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let StoreInner { entries, lru } = &mut *inner;
        let mut removed = 0;
        entries.retain(|_, entry| {
            entry.prune(cutoff);
            if entry.timestamps.is_empty() {
                lru.remove(entry.node);
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            tracing::debug!(removed, "rate-limit cleanup dropped empty keys");
        }
        Ok(removed)
    }

    fn key_count(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    fn memory_usage(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .iter()
            // Each key string is held twice: the map and the LRU node.
            .map(|(key, entry)| {
                key.len() * 2 + KEY_OVERHEAD_BYTES + entry.timestamps.len() * TIMESTAMP_BYTES
            })
            .sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}
