//! Purchase Flow
//!
//! The `/check` endpoint: the full path of one rush-purchase attempt.
//!
//! identity filter -> distributed authorization -> inventory gate -> order message.
//!
//! The answer is `true` once the order is accepted into the pipeline, which is not the
//! same as the order having been persisted. Every failure along the way answers `false`.

pub mod handlers;
pub mod service;

pub use service::{PurchaseService, Rejection};

/// Rush-purchase endpoint. Expects `?productID=<id>` and the identity cookies.
pub const ENDPOINT_CHECK: &str = "/check";
