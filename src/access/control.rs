use super::protocol::HOP_HEADER;
use super::strategy::{Authority, Dispatch};
use crate::error::AccessError;
use crate::identity::IdentityCookies;
use crate::ring::{ClusterRing, Node};

use axum::http::HeaderMap;
use std::sync::Arc;

/// Per-node entry point for distributed authorization.
pub struct AccessControl {
    local_node: Node,
    ring: Arc<ClusterRing>,
    authority: Arc<dyn Authority>,
}

impl AccessControl {
    pub fn new(local_node: Node, ring: Arc<ClusterRing>, authority: Arc<dyn Authority>) -> Arc<Self> {
        Arc::new(Self {
            local_node,
            ring,
            authority,
        })
    }

    /// Resolves which path answers for `uid`.
    pub fn dispatch(&self, uid: &str) -> Result<Dispatch, AccessError> {
        let owner = self.ring.owner(uid)?;
        if owner == self.local_node {
            Ok(Dispatch::Local)
        } else {
            Ok(Dispatch::Remote(owner))
        }
    }

    /// Fail-closed boolean view of [`AccessControl::authorize`].
    pub async fn is_authorized(&self, headers: &HeaderMap) -> bool {
        match self.authorize(headers).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Access denied on {}: {}", self.local_node, e);
                false
            }
        }
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> Result<(), AccessError> {
        let cookies = IdentityCookies::from_headers(headers)?;
        match self.route(headers, &cookies)? {
            Dispatch::Local => self.authority.check_local(&cookies.uid).await,
            Dispatch::Remote(owner) => {
                tracing::debug!("Proxying uid {} to owner {}", cookies.uid, owner);
                self.authority.check_remote(&owner, &cookies).await
            }
        }
    }

    /// Records the caller on its owner node so that a `RequireRecord` owner grants it.
    pub async fn register(&self, headers: &HeaderMap) -> Result<(), AccessError> {
        let cookies = IdentityCookies::from_headers(headers)?;
        match self.route(headers, &cookies)? {
            Dispatch::Local => {
                self.authority.register_local(&cookies.uid).await?;
                tracing::info!("Registered uid {} on {}", cookies.uid, self.local_node);
                Ok(())
            }
            Dispatch::Remote(owner) => self.authority.register_remote(&owner, &cookies).await,
        }
    }

    /// Like [`AccessControl::dispatch`], but a request that was already proxied once is
    /// never sent on again.
    fn route(&self, headers: &HeaderMap, cookies: &IdentityCookies) -> Result<Dispatch, AccessError> {
        let dispatch = self.dispatch(&cookies.uid)?;
        if let Dispatch::Remote(owner) = &dispatch
            && headers.contains_key(HOP_HEADER)
        {
            tracing::warn!(
                "Proxied request for uid {} landed on {}, but ring says {} owns it",
                cookies.uid,
                self.local_node,
                owner
            );
            return Err(AccessError::HopLimit(cookies.uid.clone()));
        }
        Ok(dispatch)
    }
}
