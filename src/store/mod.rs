//! Worker-Side Key-Value Store
//!
//! The worker talks to its storage through the [`KvStore`] capability so the
//! service loop does not depend on a concrete eviction strategy. The only
//! implementation shipped is [`LruCache`], a bounded least-recently-used cache.
//!
//! # Design
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   LruCache                    │
//! │  ┌──────────────────┐   ┌──────────────────┐  │
//! │  │ HashMap<Bytes,   │──▶│ Arena<Node>      │  │
//! │  │         slot>    │   │ head ⇄ ... ⇄ tail│  │
//! │  └──────────────────┘   └──────────────────┘  │
//! │            one parking_lot::Mutex             │
//! └───────────────────────────────────────────────┘
//! ```

mod lru;

#[cfg(test)]
mod proptest;

use bytes::Bytes;

pub use lru::{LruCache, LruStats};

/// Default worker capacity in entries
pub const DEFAULT_CAPACITY: usize = 100_000;

/// An entry pushed out of the cache to make room for a new key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evicted {
    pub key: Bytes,
    pub value: Bytes,
}

/// Storage capability used by the worker service.
///
/// Implementations must be safe to call from many connection tasks at once.
pub trait KvStore: Send + Sync + 'static {
    /// Look up a key, marking it most recently used on a hit
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Insert or replace a key, returning the entry evicted to make room (if any)
    fn put(&self, key: Bytes, value: Bytes) -> Option<Evicted>;

    /// Remove a key, returning whether it was present
    fn delete(&self, key: &[u8]) -> bool;

    /// Current number of entries
    fn len(&self) -> usize;

    /// Check if the store holds no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
