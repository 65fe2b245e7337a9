//! Broker Network Protocol
//!
//! Endpoints and DTOs of the broker service. Paths are relative to `/queue/:name`.

use super::types::{Delivery, DeliveryTag, MessageId};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_QUEUE: &str = "/queue";
pub const ENDPOINT_PUBLISH: &str = "/publish";
pub const ENDPOINT_NEXT: &str = "/next";
pub const ENDPOINT_ACK: &str = "/ack";
pub const ENDPOINT_NACK: &str = "/nack";
pub const ENDPOINT_STATS: &str = "/stats";

/// ProductLookup endpoint exposed by the consumer role.
pub const ENDPOINT_PRODUCT: &str = "/product";

/// Upper bound on a single long-poll.
pub const MAX_WAIT_MS: u64 = 30_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishRequest {
    pub message_id: MessageId,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextQuery {
    pub wait_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextDeliveryResponse {
    pub delivery: Option<Delivery>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckRequest {
    pub tag: DeliveryTag,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NackRequest {
    pub tag: DeliveryTag,
    pub requeue: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BrokerResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl BrokerResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub fn queue_url(base_url: &str, queue: &str, endpoint: &str) -> String {
    format!("{}{}/{}{}", base_url, ENDPOINT_QUEUE, queue, endpoint)
}
