//! Content cache
//!
//! In-memory, capacity-bounded LRU store mapping a name to a byte blob.
//! This is the single source of truth every other component consults: the
//! exchange protocol serves hits out of it and fills misses into it, and the
//! filesystem bridge reads and writes through it on every operation.
//!
//! # Locking
//!
//! One `RwLock` guards the whole cache. `get` promotes the entry to
//! most-recently-used, so it takes the write lock along with the real
//! mutators (`put`, `delete`, `clear`). The snapshot accessors (`keys`,
//! `size`, `count`, `contains`, `entry_len`) share the read lock. No lock is
//! ever held across I/O.

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

/// Default capacity: 256 MB of blob data.
pub const DEFAULT_CAPACITY_BYTES: u64 = 256 * 1024 * 1024;

struct Inner {
    /// Recency-ordered entries. Unbounded: eviction is driven by the byte
    /// accounting below, not by entry count.
    entries: LruCache<String, Vec<u8>>,
    /// Total bytes currently stored.
    used: u64,
}

/// Byte-capacity-bounded LRU cache of named blobs.
pub struct ContentCache {
    capacity: u64,
    inner: RwLock<Inner>,
}

impl ContentCache {
    /// Create a cache that holds at most `capacity` bytes of blob data.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                used: 0,
            }),
        }
    }

    /// Look up a blob by name, promoting it to most-recently-used.
    ///
    /// Returns an owned copy; the cache may evict or overwrite the entry the
    /// moment the lock is released.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.write();
        inner.entries.get(key).cloned()
    }

    /// Insert or replace a blob, evicting least-recently-used entries until
    /// it fits.
    ///
    /// A blob larger than the total capacity is rejected outright (returns
    /// `false`) so the capacity invariant holds unconditionally. Everything
    /// else is accepted and promoted to most-recently-used.
    pub fn put(&self, key: &str, data: Vec<u8>) -> bool {
        let incoming = data.len() as u64;
        if incoming > self.capacity {
            warn!(
                key = %key,
                size = incoming,
                capacity = self.capacity,
                "cache: rejecting oversize entry"
            );
            return false;
        }

        let mut inner = self.inner.write();

        // Replacing an entry frees its old bytes first, and takes it out of
        // the recency list so the eviction loop below cannot double-count it.
        if let Some(old) = inner.entries.pop(key) {
            inner.used -= old.len() as u64;
        }

        // Evict oldest-first until the new entry fits.
        while inner.used + incoming > self.capacity {
            match inner.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    inner.used -= evicted.len() as u64;
                    debug!(key = %evicted_key, size = evicted.len(), "cache: evicted");
                }
                None => break,
            }
        }

        inner.entries.put(key.to_string(), data);
        inner.used += incoming;
        trace!(key = %key, size = incoming, used = inner.used, "cache: stored");
        true
    }

    /// Remove a blob. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.entries.pop(key) {
            Some(old) => {
                inner.used -= old.len() as u64;
                trace!(key = %key, "cache: deleted");
                true
            }
            None => false,
        }
    }

    /// Snapshot of the current key set.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Whether a name is currently cached. Does not promote.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().entries.contains(key)
    }

    /// Size of one entry in bytes, without promoting it.
    ///
    /// The filesystem bridge uses this for `attr` so that stat calls don't
    /// disturb the recency order.
    pub fn entry_len(&self, key: &str) -> Option<u64> {
        self.inner.read().entries.peek(key).map(|d| d.len() as u64)
    }

    /// Total bytes currently stored.
    pub fn size(&self) -> u64 {
        self.inner.read().used
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.used = 0;
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("capacity", &self.capacity)
            .field("used", &self.size())
            .field("count", &self.count())
            .finish()
    }
}
