use super::broker::{Broker, InMemoryBroker, QueueStats};
use super::protocol::*;
use super::store::ProductStore;
use super::types::Product;
use crate::error::{BrokerError, StoreError};

use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Duration;

fn broker_failure(e: BrokerError) -> (StatusCode, Json<BrokerResponse>) {
    let status = match e {
        BrokerError::UnknownDelivery(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!("Broker request failed: {}", e);
    (status, Json(BrokerResponse::failed(e.to_string())))
}

/// `POST /queue/:name/publish`
pub async fn handle_publish(
    Extension(broker): Extension<Arc<InMemoryBroker>>,
    Path(queue): Path<String>,
    Json(req): Json<PublishRequest>,
) -> (StatusCode, Json<BrokerResponse>) {
    match broker.publish(&queue, req.message_id, req.body).await {
        Ok(()) => (StatusCode::OK, Json(BrokerResponse::ok())),
        Err(e) => broker_failure(e),
    }
}

/// `GET /queue/:name/next?wait_ms=`
pub async fn handle_next(
    Extension(broker): Extension<Arc<InMemoryBroker>>,
    Path(queue): Path<String>,
    Query(query): Query<NextQuery>,
) -> (StatusCode, Json<NextDeliveryResponse>) {
    let wait = Duration::from_millis(query.wait_ms.unwrap_or(0).min(MAX_WAIT_MS));
    match broker.next_delivery(&queue, wait).await {
        Ok(delivery) => (StatusCode::OK, Json(NextDeliveryResponse { delivery })),
        Err(e) => {
            tracing::error!("Failed to fetch from {}: {}", queue, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(NextDeliveryResponse { delivery: None }),
            )
        }
    }
}

/// `POST /queue/:name/ack`
pub async fn handle_ack(
    Extension(broker): Extension<Arc<InMemoryBroker>>,
    Path(queue): Path<String>,
    Json(req): Json<AckRequest>,
) -> (StatusCode, Json<BrokerResponse>) {
    match broker.ack(&queue, req.tag).await {
        Ok(()) => (StatusCode::OK, Json(BrokerResponse::ok())),
        Err(e) => broker_failure(e),
    }
}

/// `POST /queue/:name/nack`
pub async fn handle_nack(
    Extension(broker): Extension<Arc<InMemoryBroker>>,
    Path(queue): Path<String>,
    Json(req): Json<NackRequest>,
) -> (StatusCode, Json<BrokerResponse>) {
    match broker.nack(&queue, req.tag, req.requeue).await {
        Ok(()) => (StatusCode::OK, Json(BrokerResponse::ok())),
        Err(e) => broker_failure(e),
    }
}

/// `GET /queue/:name/stats`
pub async fn handle_stats(
    Extension(broker): Extension<Arc<InMemoryBroker>>,
    Path(queue): Path<String>,
) -> (StatusCode, Json<QueueStats>) {
    match broker.stats(&queue).await {
        Ok(stats) => (StatusCode::OK, Json(stats)),
        Err(e) => {
            tracing::error!("Failed to read stats for {}: {}", queue, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(QueueStats::default()))
        }
    }
}

/// `GET /product/:id`
pub async fn handle_get_product(
    Extension(products): Extension<Arc<dyn ProductStore>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Option<Product>>) {
    match products.get_product_by_id(id).await {
        Ok(product) => (StatusCode::OK, Json(Some(product))),
        Err(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, Json(None)),
        Err(e) => {
            tracing::error!("Product lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(None))
        }
    }
}
