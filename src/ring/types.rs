use serde::{Deserialize, Serialize};
use std::fmt;

/// A network address participating in the ring, e.g. `10.0.0.7:8083`.
///
/// The same label must be configured on every node, since it is both hashed onto
/// the ring and used to reach the node over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Node(pub String);

impl Node {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL used to proxy requests to this node.
    pub fn base_url(&self) -> String {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            self.0.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.0)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Node {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}
