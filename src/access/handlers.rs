use super::control::AccessControl;
use super::protocol::decision_body;

use axum::{Extension, http::HeaderMap, http::StatusCode};
use std::sync::Arc;

/// `GET /checkRight`: authorization only, no purchase side effects.
pub async fn handle_check_right(
    Extension(access): Extension<Arc<AccessControl>>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    let granted = access.is_authorized(&headers).await;
    (StatusCode::OK, decision_body(granted))
}

/// `POST /register`: records the caller on its owner node.
pub async fn handle_register(
    Extension(access): Extension<Arc<AccessControl>>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    match access.register(&headers).await {
        Ok(()) => (StatusCode::OK, decision_body(true)),
        Err(e) => {
            tracing::warn!("Registration failed: {}", e);
            (StatusCode::OK, decision_body(false))
        }
    }
}
