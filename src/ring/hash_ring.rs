use super::types::Node;
use crate::error::RingError;

use std::collections::{BTreeMap, BTreeSet};

/// Virtual replicas inserted per node unless configured otherwise.
pub const DEFAULT_REPLICAS: usize = 160;

/// Ordered mapping of replica hash -> owning node.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    points: BTreeMap<u64, Node>,
    nodes: BTreeSet<Node>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::with_replicas(DEFAULT_REPLICAS)
    }

    pub fn with_replicas(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            points: BTreeMap::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// Builds a ring from a static node list.
    pub fn from_nodes<I>(nodes: I, replicas: usize) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        let mut ring = Self::with_replicas(replicas);
        for node in nodes {
            ring.add(node);
        }
        ring
    }

    /// Inserts `replicas` virtual points for `node`. Adding a node twice is a no-op.
    pub fn add(&mut self, node: Node) {
        if !self.nodes.insert(node.clone()) {
            return;
        }
        for i in 0..self.replicas {
            self.points.insert(replica_hash(&node, i), node.clone());
        }
        tracing::debug!("Added {} to ring ({} points)", node, self.points.len());
    }

    /// Removes every virtual point belonging to `node`.
    pub fn remove(&mut self, node: &Node) {
        if !self.nodes.remove(node) {
            return;
        }
        for i in 0..self.replicas {
            let hash = replica_hash(node, i);
            // Only drop the point if it still belongs to this node (hash collision).
            if self.points.get(&hash) == Some(node) {
                self.points.remove(&hash);
            }
        }
        tracing::debug!("Removed {} from ring ({} points)", node, self.points.len());
    }

    /// Returns the owner of `key`: the first replica clockwise from the key's hash.
    pub fn get(&self, key: &str) -> Result<&Node, RingError> {
        let hash = key_hash(key.as_bytes());
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, node)| node)
            .ok_or(RingError::NotReady)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.contains(node)
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

fn replica_hash(node: &Node, index: usize) -> u64 {
    key_hash(format!("{}#{}", index, node.as_str()).as_bytes())
}

/// blake3 is stable across processes and platforms, unlike `DefaultHasher`.
fn key_hash(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}
