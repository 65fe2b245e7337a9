use super::broker::Broker;
use super::types::{MessageId, OrderMessage};
use crate::error::PipelineError;

use std::sync::Arc;

/// Publishes admitted purchases to the order queue.
pub struct OrderProducer {
    broker: Arc<dyn Broker>,
    queue: String,
}

impl OrderProducer {
    pub fn new(broker: Arc<dyn Broker>, queue: &str) -> Arc<Self> {
        Arc::new(Self {
            broker,
            queue: queue.to_string(),
        })
    }

    /// Hands the message to the broker. Returns once it is enqueued; nothing waits for
    /// the order to be persisted.
    pub async fn publish(&self, message: OrderMessage) -> Result<MessageId, PipelineError> {
        let body = serde_json::to_string(&message)?;
        let message_id = MessageId::new();
        self.broker
            .publish(&self.queue, message_id.clone(), body)
            .await?;
        tracing::info!(
            "Published order message {} (user {}, product {})",
            message_id,
            message.user_id,
            message.product_id
        );
        Ok(message_id)
    }
}
