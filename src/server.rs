//! HTTP Surfaces
//!
//! One router per role. The standalone role merges all of them into a single process.
//! Routers that serve identity-gated endpoints carry the filter chain as middleware.

use crate::access::AccessControl;
use crate::access::handlers::{handle_check_right, handle_register};
use crate::access::protocol::{ENDPOINT_CHECK_RIGHT, ENDPOINT_REGISTER};
use crate::admission::AdmissionController;
use crate::admission::handlers::{handle_gate_stats, handle_get_one};
use crate::admission::protocol::{ENDPOINT_GATE_STATS, ENDPOINT_GET_ONE};
use crate::filter::{FilterChain, enforce, signed_identity_filter};
use crate::identity::SignedIdentity;
use crate::pipeline::handlers::*;
use crate::pipeline::protocol::*;
use crate::pipeline::{InMemoryBroker, ProductStore};
use crate::purchase::handlers::handle_check;
use crate::purchase::{ENDPOINT_CHECK, PurchaseService};

use axum::{
    Extension, Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

/// `/check`, `/checkRight` and `/register`, all behind the signed-identity filter.
pub fn node_router(
    identity: Arc<SignedIdentity>,
    access: Arc<AccessControl>,
    purchase: Arc<PurchaseService>,
) -> Router {
    let filters = Arc::new(
        FilterChain::new()
            .with(ENDPOINT_CHECK, signed_identity_filter(identity.clone()))
            .with(ENDPOINT_CHECK_RIGHT, signed_identity_filter(identity.clone()))
            .with(ENDPOINT_REGISTER, signed_identity_filter(identity)),
    );

    Router::new()
        .route(ENDPOINT_CHECK, get(handle_check))
        .route(ENDPOINT_CHECK_RIGHT, get(handle_check_right))
        .route(ENDPOINT_REGISTER, post(handle_register))
        .layer(middleware::from_fn_with_state(filters, enforce))
        .layer(Extension(access))
        .layer(Extension(purchase))
}

pub fn gate_router(gate: Arc<AdmissionController>) -> Router {
    Router::new()
        .route(ENDPOINT_GET_ONE, get(handle_get_one))
        .route(ENDPOINT_GATE_STATS, get(handle_gate_stats))
        .layer(Extension(gate))
}

pub fn broker_router(broker: Arc<InMemoryBroker>) -> Router {
    let queue_route = |endpoint: &str| format!("{}/:name{}", ENDPOINT_QUEUE, endpoint);

    Router::new()
        .route(&queue_route(ENDPOINT_PUBLISH), post(handle_publish))
        .route(&queue_route(ENDPOINT_NEXT), get(handle_next))
        .route(&queue_route(ENDPOINT_ACK), post(handle_ack))
        .route(&queue_route(ENDPOINT_NACK), post(handle_nack))
        .route(&queue_route(ENDPOINT_STATS), get(handle_stats))
        .layer(Extension(broker))
}

pub fn consumer_router(products: Arc<dyn ProductStore>) -> Router {
    Router::new()
        .route(&format!("{}/:id", ENDPOINT_PRODUCT), get(handle_get_product))
        .layer(Extension(products))
}

/// Every surface in one process.
pub fn standalone_router(
    identity: Arc<SignedIdentity>,
    access: Arc<AccessControl>,
    purchase: Arc<PurchaseService>,
    gate: Arc<AdmissionController>,
    broker: Arc<InMemoryBroker>,
    products: Arc<dyn ProductStore>,
) -> Router {
    node_router(identity, access, purchase)
        .merge(gate_router(gate))
        .merge(broker_router(broker))
        .merge(consumer_router(products))
}

/// Resolves when the process is asked to stop.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
