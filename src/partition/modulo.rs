//! Modulo Partitioner
//!
//! primary = members[hash(key) mod N], secondary = the next member.
//! Adding or removing a node changes N and therefore reassigns a large
//! fraction of keys; use [`super::ConsistentRing`] where that matters.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use super::{fnv1a, initial_members, Owners, Partitioner};
use crate::error::Result;

/// Static `hash mod N` partitioner over the sorted member list
pub struct ModuloPartitioner {
    /// BTreeSet iteration order is the indexing order
    nodes: RwLock<BTreeSet<String>>,
}

impl ModuloPartitioner {
    /// Create a partitioner; requires at least two distinct members
    pub fn new(members: &[String]) -> Result<Self> {
        Ok(Self {
            nodes: RwLock::new(initial_members(members)?),
        })
    }
}

impl Partitioner for ModuloPartitioner {
    fn owners_for(&self, key: &[u8]) -> Option<Owners> {
        let nodes = self.nodes.read();
        let n = nodes.len();
        if n == 0 {
            return None;
        }

        let idx = fnv1a(key) as usize % n;
        let mut ring = nodes.iter().cycle().skip(idx);
        let primary = ring.next()?.clone();
        let secondary = ring.next()?.clone();

        Some(Owners { primary, secondary })
    }

    fn members(&self) -> Vec<String> {
        self.nodes.read().iter().cloned().collect()
    }

    fn add(&self, node: &str) {
        self.nodes.write().insert(node.to_string());
    }

    fn remove(&self, node: &str) {
        self.nodes.write().remove(node);
    }

    fn name(&self) -> &'static str {
        "modulo"
    }
}
