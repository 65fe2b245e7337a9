use super::hash_ring::HashRing;
use super::types::Node;
use crate::error::RingError;

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared handle to the ring used at request time.
///
/// Readers load an immutable snapshot without locking. Membership changes are
/// serialized by `writer` and published by swapping in a new snapshot.
pub struct ClusterRing {
    current: ArcSwap<HashRing>,
    writer: Mutex<()>,
}

impl ClusterRing {
    pub fn new(ring: HashRing) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(ring),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<HashRing> {
        self.current.load_full()
    }

    pub fn owner(&self, key: &str) -> Result<Node, RingError> {
        self.current.load().get(key).cloned()
    }

    pub fn add_node(&self, node: Node) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashRing::clone(&self.current.load());
        next.add(node.clone());
        self.current.store(Arc::new(next));
        tracing::info!("Ring membership: joined {}", node);
    }

    pub fn remove_node(&self, node: &Node) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashRing::clone(&self.current.load());
        next.remove(node);
        self.current.store(Arc::new(next));
        tracing::info!("Ring membership: left {}", node);
    }

    pub fn members(&self) -> Vec<Node> {
        self.current.load().nodes()
    }
}
