use super::protocol::{BODY_TRUE, ENDPOINT_CHECK_RIGHT, ENDPOINT_REGISTER, HOP_HEADER};
use super::records::AccessRecords;
use crate::error::AccessError;
use crate::identity::IdentityCookies;
use crate::ring::Node;

use async_trait::async_trait;
use axum::http::header;
use std::sync::Arc;
use std::time::Duration;

/// Where a request's authorization is decided, chosen once per request from the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Local,
    Remote(Node),
}

/// The two ways of answering "is this user allowed": from local state, or by asking the owner.
#[async_trait]
pub trait Authority: Send + Sync {
    async fn check_local(&self, uid: &str) -> Result<(), AccessError>;

    async fn check_remote(&self, owner: &Node, cookies: &IdentityCookies)
    -> Result<(), AccessError>;

    async fn register_local(&self, uid: &str) -> Result<(), AccessError>;

    async fn register_remote(
        &self,
        owner: &Node,
        cookies: &IdentityCookies,
    ) -> Result<(), AccessError>;
}

/// Production authority: local record cache + HTTP proxy to the owner node.
pub struct ClusterAuthority {
    records: Arc<AccessRecords>,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ClusterAuthority {
    pub fn new(records: Arc<AccessRecords>, timeout: Duration) -> Self {
        Self {
            records,
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Sends the identity pair to the owner with `request`. Only HTTP 200 with body
    /// `true` counts as success.
    async fn ask_owner(
        &self,
        request: reqwest::RequestBuilder,
        owner: &Node,
        cookies: &IdentityCookies,
    ) -> Result<(), AccessError> {
        let transport = |e: reqwest::Error| AccessError::Transport {
            target: owner.to_string(),
            reason: e.to_string(),
        };

        // Only the identity pair is forwarded, never the caller's other cookies.
        let response = request
            .header(header::COOKIE, cookies.cookie_header())
            .header(HOP_HEADER, "1")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?;

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!("Owner {} answered {}", owner, response.status());
            return Err(AccessError::RemoteDenied(owner.to_string()));
        }

        let body = response.text().await.map_err(transport)?;
        if body == BODY_TRUE {
            Ok(())
        } else {
            Err(AccessError::RemoteDenied(owner.to_string()))
        }
    }
}

#[async_trait]
impl Authority for ClusterAuthority {
    async fn check_local(&self, uid: &str) -> Result<(), AccessError> {
        self.records.check(uid).await
    }

    async fn check_remote(
        &self,
        owner: &Node,
        cookies: &IdentityCookies,
    ) -> Result<(), AccessError> {
        let url = format!("{}{}", owner.base_url(), ENDPOINT_CHECK_RIGHT);
        self.ask_owner(self.http_client.get(url), owner, cookies)
            .await
    }

    async fn register_local(&self, uid: &str) -> Result<(), AccessError> {
        self.records.register(uid).await
    }

    async fn register_remote(
        &self,
        owner: &Node,
        cookies: &IdentityCookies,
    ) -> Result<(), AccessError> {
        let url = format!("{}{}", owner.base_url(), ENDPOINT_REGISTER);
        self.ask_owner(self.http_client.post(url), owner, cookies)
            .await
    }
}
