//! Bounded LRU Cache
//!
//! O(1) get/put/delete using a hash index into an arena of doubly-linked
//! nodes. The list head is the most recently used entry, the tail is the
//! next eviction victim. Freed arena slots are recycled through a free list.
//!
//! All index and list mutation happens under a single `parking_lot::Mutex`;
//! hit/miss/eviction counters are atomics outside the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use super::{Evicted, KvStore};
use crate::error::{Error, Result};

/// Sentinel for "no neighbour"
const NIL: usize = usize::MAX;

struct Node {
    key: Bytes,
    value: Bytes,
    prev: usize,
    next: usize,
}

/// Index and recency list, guarded as one unit
struct LruInner {
    index: HashMap<Bytes, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
}

impl LruInner {
    fn with_capacity(capacity: usize) -> Self {
        // Pre-size modestly; huge capacities grow on demand
        let initial = capacity.min(1024);
        Self {
            index: HashMap::with_capacity(initial),
            nodes: Vec::with_capacity(initial),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.nodes[slot];
            (node.prev, node.next)
        };

        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        let node = &mut self.nodes[slot];
        node.prev = NIL;
        node.next = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[slot];
            node.prev = NIL;
            node.next = old_head;
        }

        if old_head != NIL {
            self.nodes[old_head].prev = slot;
        }
        self.head = slot;

        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn alloc(&mut self, key: Bytes, value: Bytes) -> usize {
        let node = Node {
            key,
            value,
            prev: NIL,
            next: NIL,
        };

        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Detach a slot from list and index and hand its contents back
    fn remove_slot(&mut self, slot: usize) -> (Bytes, Bytes) {
        self.unlink(slot);
        let node = &mut self.nodes[slot];
        let key = std::mem::take(&mut node.key);
        let value = std::mem::take(&mut node.value);
        self.index.remove(&key);
        self.free.push(slot);
        (key, value)
    }
}

/// Bounded key-value cache with least-recently-used eviction
pub struct LruCache {
    inner: Mutex<LruInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LruCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Fails with [`Error::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        Ok(Self {
            inner: Mutex::new(LruInner::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a value, marking the key most recently used
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let mut inner = self.inner.lock();

        match inner.index.get(key).copied() {
            Some(slot) => {
                inner.touch(slot);
                let value = inner.nodes[slot].value.clone();
                drop(inner);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                drop(inner);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or update a key, marking it most recently used.
    ///
    /// Updating an existing key never evicts. Inserting a new key into a full
    /// cache evicts and returns the least recently used entry.
    pub fn put(&self, key: Bytes, value: Bytes) -> Option<Evicted> {
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.index.get(&key).copied() {
            inner.nodes[slot].value = value;
            inner.touch(slot);
            return None;
        }

        let slot = inner.alloc(key.clone(), value);
        inner.push_front(slot);
        inner.index.insert(key, slot);

        if inner.index.len() <= self.capacity {
            return None;
        }

        let victim = inner.tail;
        let (key, value) = inner.remove_slot(victim);
        drop(inner);

        self.evictions.fetch_add(1, Ordering::Relaxed);
        Some(Evicted { key, value })
    }

    /// Remove a key, returning whether it was present
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.lock();

        match inner.index.get(key).copied() {
            Some(slot) => {
                inner.remove_slot(slot);
                true
            }
            None => false,
        }
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys ordered from most to least recently used
    pub fn keys(&self) -> Vec<Bytes> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.index.len());
        let mut slot = inner.head;
        while slot != NIL {
            let node = &inner.nodes[slot];
            keys.push(node.key.clone());
            slot = node.next;
        }
        keys
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> LruStats {
        LruStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
        }
    }
}

impl KvStore for LruCache {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        LruCache::get(self, key)
    }

    fn put(&self, key: Bytes, value: Bytes) -> Option<Evicted> {
        LruCache::put(self, key, value)
    }

    fn delete(&self, key: &[u8]) -> bool {
        LruCache::delete(self, key)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// LRU cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LruStats {
    /// Number of entries
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
