//! Error Taxonomy
//!
//! Every failure the cluster can observe, grouped by where it happens.
//! Request-path errors (`AccessError`, `RingError`, `IdentityError`) are always
//! collapsed into a `false` answer by their callers. Pipeline errors
//! (`PipelineError`, `StoreError`, `BrokerError`) decide whether a queued message
//! is acknowledged, retried, or dead-lettered.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised by the consistent hash ring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("hash ring has no nodes")]
    NotReady,
}

/// Errors raised while minting or opening a signed identity token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("signing key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("token is not valid base64")]
    Decode,

    #[error("token could not be decrypted")]
    Decrypt,
}

/// Reasons a request is denied by the authorization layer.
///
/// All of these are fail-closed: the caller only ever sees a denial.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("missing `{0}` cookie")]
    MissingCookie(&'static str),

    #[error("identity signature has been tampered with")]
    TamperedSignature,

    #[error("identity signature does not match uid")]
    IdentityMismatch,

    #[error("uid `{0}` is not a numeric user id")]
    InvalidUid(String),

    #[error("routing failed: {0}")]
    Routing(#[from] RingError),

    #[error("transport to {target} failed: {reason}")]
    Transport { target: String, reason: String },

    #[error("remote node {0} denied the request")]
    RemoteDenied(String),

    #[error("proxied request reached a node that does not own uid `{0}`")]
    HopLimit(String),

    #[error("local policy denied uid {0}")]
    LocalDenied(i64),
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Errors raised by the `OrderStore` / `ProductStore` collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("product {0} not found")]
    NotFound(i64),

    #[error("product {0} is out of stock")]
    OutOfStock(i64),

    #[error("order {0} not found")]
    OrderNotFound(i64),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Permanent failures will never succeed on redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::OutOfStock(_) | StoreError::OrderNotFound(_)
        )
    }
}

/// Errors raised by a message broker implementation.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("unknown delivery tag {0}")]
    UnknownDelivery(u64),

    #[error("broker transport failed: {0}")]
    Transport(String),

    #[error("broker rejected request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        BrokerError::Transport(e.to_string())
    }
}

/// Errors on the order-intake pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed order message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}
