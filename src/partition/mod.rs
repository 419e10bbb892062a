//! Key Partitioning
//!
//! Maps a key to the ordered pair of workers that own it. Two strategies are
//! available, selected once at orchestrator construction:
//!
//! - [`ModuloPartitioner`] - `hash(key) mod N` over the sorted member list.
//!   Simple, but a membership change reassigns most keys.
//! - [`ConsistentRing`] - consistent hashing with virtual nodes. A membership
//!   change only moves the keys owned by the affected node.
//!
//! Both keep their membership behind a `parking_lot::RwLock`, so lookups run
//! concurrently and `add`/`remove` are exclusive with respect to them.

mod hash;
mod modulo;
mod ring;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Error, Result};

pub use hash::fnv1a;
pub use modulo::ModuloPartitioner;
pub use ring::ConsistentRing;

/// Number of owners every key is replicated to
pub const REPLICATION_FACTOR: usize = 2;

/// Default virtual points per physical node on the ring
pub const DEFAULT_VNODES: usize = 128;

/// Owning workers of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owners {
    pub primary: String,
    pub secondary: String,
}

impl Owners {
    /// Check if the key lives on the given node
    pub fn contains(&self, node: &str) -> bool {
        self.primary == node || self.secondary == node
    }
}

/// Partitioning capability used by the orchestrator
pub trait Partitioner: Send + Sync + 'static {
    /// Owners of `key` under the current membership.
    ///
    /// `None` only when every member has been removed. With a single member
    /// left, primary and secondary are the same node.
    fn owners_for(&self, key: &[u8]) -> Option<Owners>;

    /// Current members, sorted
    fn members(&self) -> Vec<String>;

    /// Add a node; adding an existing member is a no-op
    fn add(&self, node: &str);

    /// Remove a node; removing an unknown node is a no-op
    fn remove(&self, node: &str);

    /// Strategy name (for logging)
    fn name(&self) -> &'static str;
}

/// Partitioning strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PartitionStrategy {
    /// hash(key) mod N
    #[default]
    #[value(alias = "static")]
    Modulo,
    /// Consistent hash ring with virtual nodes
    #[value(name = "consistent-ring", alias = "consistent")]
    ConsistentRing,
}

impl std::fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionStrategy::Modulo => write!(f, "modulo"),
            PartitionStrategy::ConsistentRing => write!(f, "consistent-ring"),
        }
    }
}

/// Build the partitioner selected by `strategy`
pub fn build_partitioner(
    strategy: PartitionStrategy,
    members: &[String],
    vnodes: usize,
) -> Result<Arc<dyn Partitioner>> {
    let partitioner: Arc<dyn Partitioner> = match strategy {
        PartitionStrategy::Modulo => Arc::new(ModuloPartitioner::new(members)?),
        PartitionStrategy::ConsistentRing => Arc::new(ConsistentRing::new(members, vnodes)?),
    };
    Ok(partitioner)
}

/// De-duplicate and validate an initial member list
fn initial_members(members: &[String]) -> Result<BTreeSet<String>> {
    let set: BTreeSet<String> = members
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    if set.len() < REPLICATION_FACTOR {
        return Err(Error::InsufficientMembers {
            required: REPLICATION_FACTOR,
            actual: set.len(),
        });
    }
    Ok(set)
}
