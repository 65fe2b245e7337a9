use super::controller::{AdmissionController, AdmissionSnapshot};
use crate::access::protocol::decision_body;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

/// `GET /getOne`
pub async fn handle_get_one(
    Extension(gate): Extension<Arc<AdmissionController>>,
) -> (StatusCode, &'static str) {
    (StatusCode::OK, decision_body(gate.try_admit()))
}

/// `GET /gate/stats`
pub async fn handle_gate_stats(
    Extension(gate): Extension<Arc<AdmissionController>>,
) -> (StatusCode, Json<AdmissionSnapshot>) {
    (StatusCode::OK, Json(gate.snapshot()))
}
