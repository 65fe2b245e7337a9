use serde::{Deserialize, Serialize};
use std::fmt;

/// Queued unit of work. Field names are fixed by the wire format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderMessage {
    #[serde(rename = "UserID")]
    pub user_id: i64,
    #[serde(rename = "ProductID")]
    pub product_id: i64,
}

impl OrderMessage {
    pub fn new(user_id: i64, product_id: i64) -> Self {
        Self {
            user_id,
            product_id,
        }
    }
}

/// Broker-level message identity. Storage effects are deduplicated on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one delivery attempt; a redelivered message gets a new tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DeliveryTag(pub u64);

/// A message handed to a consumer and awaiting ack/nack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub message_id: MessageId,
    pub body: String,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_count: u32,
}

impl Delivery {
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub number: i64,
    pub image: String,
    pub url: String,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, number: i64) -> Self {
        Self {
            id,
            name: name.into(),
            number,
            image: String::new(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Wait,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub status: OrderStatus,
}
