use super::service::PurchaseService;
use crate::access::protocol::decision_body;

use axum::{Extension, extract::Query, http::HeaderMap, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PurchaseQuery {
    #[serde(rename = "productID")]
    pub product_id: Option<String>,
}

/// `GET /check?productID=<id>`
pub async fn handle_check(
    Extension(purchase): Extension<Arc<PurchaseService>>,
    Query(query): Query<PurchaseQuery>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    match purchase.attempt(&headers, query.product_id.as_deref()).await {
        Ok(message_id) => {
            tracing::debug!("Purchase accepted as message {}", message_id);
            (StatusCode::OK, decision_body(true))
        }
        Err(reason) => {
            tracing::debug!("Purchase rejected: {}", reason);
            (StatusCode::OK, decision_body(false))
        }
    }
}
