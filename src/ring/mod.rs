//! Consistent Hash Ring
//!
//! Decides which node in the cluster owns a given user.
//!
//! ## Core Concepts
//! - **Virtual replicas**: each node is hashed onto the ring many times so ownership
//!   is spread evenly and adding/removing a node only remaps ~1/N of the keys.
//! - **Clockwise lookup**: a key is owned by the first replica at or after its hash,
//!   wrapping around to the start of the ring.
//! - **Coordination-free**: lookups are pure, so every node computes the same owner
//!   for the same key given the same membership.

pub mod cluster;
pub mod hash_ring;
pub mod types;

pub use cluster::ClusterRing;
pub use hash_ring::{DEFAULT_REPLICAS, HashRing};
pub use types::Node;
