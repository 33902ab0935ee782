//! The in-memory, dual-bounded LRU index.
//!
//! `LruIndex` maps `CacheKey -> size_bytes` and tracks recency with the intrusive list
//! in [`crate::list`], enforcing `count <= max_files` and `total_bytes <= max_bytes`
//! after every [`LruIndex::touch`]. It never touches the filesystem: eviction victims
//! are returned to the caller ([`crate::cache::ReadThroughCache`]), which deletes the
//! corresponding blobs from [`crate::store::CacheStore`] *outside* the index lock. This
//! keeps blob deletion I/O off the hot path guarded by the index mutex, and isolates a
//! delete failure from index integrity.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::digest::CacheKey;
use crate::list::{Entry as ListEntry, List};

/// `(key, size_bytes)` plus its implicit position in the recency order.
#[derive(Debug, Clone)]
struct IndexEntry {
    key: CacheKey,
    size_bytes: u64,
}

struct State {
    list: List<IndexEntry>,
    map: HashMap<CacheKey, *mut ListEntry<IndexEntry>>,
    total_bytes: u64,
}

// SAFETY: every raw pointer in `map` originates from `list` and is only ever
// dereferenced while holding the owning `LruIndex`'s mutex, so `State` can be moved
// and shared across threads like any other `Mutex`-guarded value.
unsafe impl Send for State {}

/// Thread-safe container enforcing the dual (count, byte-size) LRU bound.
///
/// This is the index lock: held only for the duration of a single [`Self::touch`]
/// call, with no I/O performed while it is held.
#[derive(Debug)]
pub struct LruIndex {
    max_files: usize,
    max_bytes: u64,
    state: Mutex<State>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("len", &self.map.len())
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl LruIndex {
    /// Creates an empty index bounded by `max_files` entries and `max_bytes` total size.
    pub fn new(max_files: usize, max_bytes: u64) -> Self {
        LruIndex {
            max_files: max_files.max(1),
            max_bytes,
            state: Mutex::new(State {
                list: List::new(),
                map: HashMap::new(),
                total_bytes: 0,
            }),
        }
    }

    /// Admits or touches `key` with the given `size` in bytes, evicting from the tail
    /// (strict least-recently-touched order) until both bounds hold.
    ///
    /// Returns the keys evicted as a result of this call, in eviction order. The caller
    /// is responsible for deleting their blobs; this method never performs I/O.
    ///
    /// If the index was empty and the single new entry alone exceeds `max_bytes`, the
    /// eviction loop stops (there is nothing left to evict) and the entry is kept:
    /// a single file larger than `max_bytes` is tolerated, not rejected.
    pub fn touch(&self, key: CacheKey, size: u64) -> Vec<CacheKey> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&node) = state.map.get(&key) {
            // SAFETY: node is a live pointer we inserted and have not removed.
            unsafe { state.list.move_to_front(node) };
            return Vec::new();
        }

        let node = state.list.add_unchecked(IndexEntry {
            key: key.clone(),
            size_bytes: size,
        });
        state.map.insert(key, node);
        state.total_bytes += size;

        let mut evicted = Vec::new();
        while state.map.len() > self.max_files || state.total_bytes > self.max_bytes {
            if state.map.len() <= 1 {
                // Stop: evicting the sole remaining entry would leave nothing for the
                // caller to actually have cached. A single file bigger than max_bytes
                // is tolerated, not corrected.
                break;
            }
            let Some(victim) = state.list.remove_last() else {
                break;
            };
            // SAFETY: victim was just removed from the list and is fully initialized.
            let victim_entry = unsafe { victim.get_value() };
            state.map.remove(&victim_entry.key);
            state.total_bytes = state.total_bytes.saturating_sub(victim_entry.size_bytes);
            evicted.push(victim_entry.key.clone());
        }

        evicted
    }

    /// Pure membership check; does not affect recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.map.contains_key(key)
    }

    /// Current number of indexed entries.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.map.len()
    }

    /// Whether the index currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current sum of indexed entries' `size_bytes`.
    pub fn total_bytes(&self) -> u64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.total_bytes
    }

    /// Test hook: returns keys in recency order (most-recent first) and `total_bytes`.
    pub fn snapshot(&self) -> (Vec<CacheKey>, u64) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys = Vec::with_capacity(state.map.len());
        state.list.for_each(|entry| keys.push(entry.key.clone()));
        (keys, state.total_bytes)
    }
}
