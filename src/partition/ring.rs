//! Consistent Hash Ring
//!
//! Every physical node contributes `vnodes` points at `fnv1a("{node}#{i}")`
//! on a 32-bit circle. A key belongs to the node owning the first point at or
//! after `fnv1a(key)`, wrapping past the largest point. The secondary is the
//! next point clockwise that belongs to a different physical node.
//!
//! # Layout
//!
//! ```text
//!              0 / 2^32
//!          ┌─────●─────┐
//!        ● B           ● A      key ──▶ first point ≥ hash(key) = primary
//!       │               │               next point of another node = secondary
//!        ● C           ● B
//!          └─────●─────┘
//!                A
//! ```
//!
//! The point table is rebuilt from scratch on every membership change and
//! kept sorted by `(hash, node)`, so equal hashes resolve deterministically.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use super::{fnv1a, initial_members, Owners, Partitioner, DEFAULT_VNODES};
use crate::error::Result;

/// Membership and the derived point table
struct RingState {
    nodes: BTreeSet<String>,
    /// Sorted copy of `nodes`, indexed by `points`
    names: Vec<String>,
    /// `(hash, index into names)`, sorted
    points: Vec<(u32, usize)>,
}

impl RingState {
    fn build(nodes: BTreeSet<String>, vnodes: usize) -> Self {
        let names: Vec<String> = nodes.iter().cloned().collect();
        let mut points = Vec::with_capacity(names.len() * vnodes);

        for (idx, name) in names.iter().enumerate() {
            for v in 0..vnodes {
                let label = format!("{}#{}", name, v);
                points.push((fnv1a(label.as_bytes()), idx));
            }
        }
        points.sort_unstable();

        Self {
            nodes,
            names,
            points,
        }
    }
}

/// Consistent hashing partitioner with virtual nodes
pub struct ConsistentRing {
    vnodes: usize,
    state: RwLock<RingState>,
}

impl ConsistentRing {
    /// Create a ring; requires at least two distinct members.
    ///
    /// A `vnodes` of zero selects [`DEFAULT_VNODES`].
    pub fn new(members: &[String], vnodes: usize) -> Result<Self> {
        let vnodes = if vnodes == 0 { DEFAULT_VNODES } else { vnodes };
        let nodes = initial_members(members)?;

        Ok(Self {
            vnodes,
            state: RwLock::new(RingState::build(nodes, vnodes)),
        })
    }

    /// Virtual points per physical node
    pub fn vnodes(&self) -> usize {
        self.vnodes
    }

    /// Total number of points on the ring
    pub fn point_count(&self) -> usize {
        self.state.read().points.len()
    }

    fn rebuild(&self, state: &mut RingState) {
        let nodes = std::mem::take(&mut state.nodes);
        *state = RingState::build(nodes, self.vnodes);
    }
}

impl Partitioner for ConsistentRing {
    fn owners_for(&self, key: &[u8]) -> Option<Owners> {
        let state = self.state.read();
        let points = &state.points;
        if points.is_empty() {
            return None;
        }

        let hash = fnv1a(key);
        let mut start = points.partition_point(|&(point, _)| point < hash);
        if start == points.len() {
            start = 0;
        }
        let primary = points[start].1;

        let secondary = (1..points.len())
            .map(|step| points[(start + step) % points.len()].1)
            .find(|&node| node != primary)
            .unwrap_or(primary);

        Some(Owners {
            primary: state.names[primary].clone(),
            secondary: state.names[secondary].clone(),
        })
    }

    fn members(&self) -> Vec<String> {
        self.state.read().names.clone()
    }

    fn add(&self, node: &str) {
        let mut state = self.state.write();
        if state.nodes.insert(node.to_string()) {
            self.rebuild(&mut state);
        }
    }

    fn remove(&self, node: &str) {
        let mut state = self.state.write();
        if state.nodes.remove(node) {
            self.rebuild(&mut state);
        }
    }

    fn name(&self) -> &'static str {
        "consistent-ring"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn nodes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key-{}", i)).collect()
    }

    #[test]
    fn test_default_vnodes() {
        let ring = ConsistentRing::new(&nodes(&["a", "b"]), 0).unwrap();
        assert_eq!(ring.vnodes(), 128);
        assert_eq!(ring.point_count(), 256);
    }

    #[test]
    fn test_points_sorted() {
        let ring = ConsistentRing::new(&nodes(&["a", "b", "c"]), 32).unwrap();
        let state = ring.state.read();
        assert!(state.points.windows(2).all(|w| w[0] <= w[1]));
        assert!(state.points.iter().all(|&(_, idx)| idx < 3));
    }

    #[test]
    fn test_primary_is_first_point_at_or_after_hash() {
        let ring = ConsistentRing::new(&nodes(&["a", "b", "c"]), 8).unwrap();
        let (points, names) = {
            let state = ring.state.read();
            (state.points.clone(), state.names.clone())
        };

        for key in keys(200) {
            let hash = fnv1a(key.as_bytes());
            let expected = points
                .iter()
                .find(|&&(point, _)| point >= hash)
                .unwrap_or(&points[0]);
            let owners = ring.owners_for(key.as_bytes()).unwrap();
            assert_eq!(owners.primary, names[expected.1]);
        }
    }

    #[test]
    fn test_deterministic_and_distinct() {
        let ring = ConsistentRing::new(&nodes(&["w1", "w2", "w3"]), 64).unwrap();
        let other = ConsistentRing::new(&nodes(&["w3", "w1", "w2"]), 64).unwrap();

        for key in keys(500) {
            let first = ring.owners_for(key.as_bytes()).unwrap();
            let again = ring.owners_for(key.as_bytes()).unwrap();
            assert_eq!(first, again);
            assert_eq!(first, other.owners_for(key.as_bytes()).unwrap());
            assert_ne!(first.primary, first.secondary);
        }
    }

    #[test]
    fn test_distinct_with_single_vnode() {
        let ring = ConsistentRing::new(&nodes(&["a", "b"]), 1).unwrap();
        for key in keys(100) {
            let owners = ring.owners_for(key.as_bytes()).unwrap();
            assert_ne!(owners.primary, owners.secondary);
        }
    }

    #[test]
    fn test_removing_non_owner_keeps_owners() {
        let members = nodes(&["n1", "n2", "n3", "n4", "n5"]);
        let ring = ConsistentRing::new(&members, 128).unwrap();
        let before: HashMap<String, Owners> = keys(1000)
            .into_iter()
            .map(|k| {
                let owners = ring.owners_for(k.as_bytes()).unwrap();
                (k, owners)
            })
            .collect();

        ring.remove("n3");

        for (key, old) in &before {
            let new = ring.owners_for(key.as_bytes()).unwrap();
            if !old.contains("n3") {
                assert_eq!(&new, old, "owners moved for {}", key);
            } else {
                assert!(!new.contains("n3"));
            }
        }
    }

    #[test]
    fn test_adding_node_moves_bounded_fraction() {
        let ring = ConsistentRing::new(&nodes(&["n1", "n2", "n3", "n4"]), 128).unwrap();
        let all = keys(2000);
        let before: Vec<String> = all
            .iter()
            .map(|k| ring.owners_for(k.as_bytes()).unwrap().primary)
            .collect();

        ring.add("n5");
        let moved: Vec<String> = all
            .iter()
            .zip(&before)
            .filter_map(|(k, old)| {
                let new = ring.owners_for(k.as_bytes()).unwrap().primary;
                (new != *old).then_some(new)
            })
            .collect();

        // Only keys taken over by the new node move, roughly 1/5 of them
        assert!(moved.iter().all(|n| n == "n5"));
        assert!(moved.len() < all.len() / 2, "{} keys moved", moved.len());
    }

    #[test]
    fn test_add_remove_rebuilds() {
        let ring = ConsistentRing::new(&nodes(&["a", "b"]), 10).unwrap();

        ring.add("c");
        ring.add("c");
        assert_eq!(ring.members(), nodes(&["a", "b", "c"]));
        assert_eq!(ring.point_count(), 30);

        ring.remove("a");
        ring.remove("missing");
        assert_eq!(ring.members(), nodes(&["b", "c"]));
        assert_eq!(ring.point_count(), 20);
    }

    #[test]
    fn test_degenerate_membership() {
        let ring = ConsistentRing::new(&nodes(&["a", "b"]), 4).unwrap();

        ring.remove("a");
        let owners = ring.owners_for(b"key").unwrap();
        assert_eq!(owners.primary, "b");
        assert_eq!(owners.secondary, "b");

        ring.remove("b");
        assert!(ring.owners_for(b"key").is_none());
        assert!(ring.members().is_empty());
    }

    #[test]
    fn test_balanced_distribution() {
        let ring = ConsistentRing::new(&nodes(&["a", "b", "c", "d"]), 128).unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for key in keys(4000) {
            *counts
                .entry(ring.owners_for(key.as_bytes()).unwrap().primary)
                .or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (node, count) in &counts {
            assert!(*count > 250, "poor distribution for {}: {:?}", node, counts);
        }
    }
}
