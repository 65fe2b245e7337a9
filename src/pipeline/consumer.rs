//! Order Consumer
//!
//! Single long-lived worker with one message in flight. Storage side effects are
//! therefore serialized in receive order.
//!
//! An order is inserted as `Wait`, becomes `Success` once its stock unit is taken, and
//! `Failed` if the stock can never be taken.

use super::broker::Broker;
use super::store::{OrderStore, ProductStore};
use super::types::{Delivery, OrderMessage, OrderStatus};
use crate::error::{BrokerError, PipelineError};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const BROKER_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Both effects applied and the message acknowledged.
    Applied { order_id: i64 },
    /// Transient failure; nacked for redelivery.
    Retry,
    /// Malformed or permanently failing; nacked without requeue.
    DeadLetter,
}

pub struct OrderConsumer {
    broker: Arc<dyn Broker>,
    queue: String,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    poll_wait: Duration,
}

impl OrderConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: &str,
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            broker,
            queue: queue.to_string(),
            orders,
            products,
            poll_wait: Duration::from_secs(1),
        })
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Consumes until `shutdown` flips to `true` (or its sender is dropped).
    /// A message already received is always finished and settled before exiting.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("[*] Waiting for messages on queue {}", self.queue);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                fetched = self.broker.next_delivery(&self.queue, self.poll_wait) => {
                    match fetched {
                        Ok(Some(delivery)) => {
                            if let Err(e) = self.handle(delivery).await {
                                tracing::error!("Failed to settle delivery: {}", e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!("Broker unavailable: {}", e);
                            tokio::time::sleep(BROKER_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        tracing::info!("Consumer on queue {} stopped", self.queue);
    }

    /// Fetches and settles at most one message, waiting up to `wait`.
    pub async fn process_next(&self, wait: Duration) -> Result<Option<Outcome>, BrokerError> {
        match self.broker.next_delivery(&self.queue, wait).await? {
            Some(delivery) => self.handle(delivery).await.map(Some),
            None => Ok(None),
        }
    }

    /// Applies one delivery and acks/nacks it according to the result.
    pub async fn handle(&self, delivery: Delivery) -> Result<Outcome, BrokerError> {
        tracing::info!(
            "Received message {} (delivery #{}): {}",
            delivery.message_id,
            delivery.delivery_count,
            delivery.body
        );

        match self.apply(&delivery).await {
            Ok(order_id) => {
                self.broker.ack(&self.queue, delivery.tag).await?;
                tracing::info!("Order {} stored for message {}", order_id, delivery.message_id);
                Ok(Outcome::Applied { order_id })
            }
            Err(PipelineError::Persistence(e)) if !e.is_permanent() => {
                tracing::error!("Message {} will be retried: {}", delivery.message_id, e);
                self.broker.nack(&self.queue, delivery.tag, true).await?;
                Ok(Outcome::Retry)
            }
            Err(PipelineError::Broker(e)) => {
                tracing::error!("Message {} will be retried: {}", delivery.message_id, e);
                self.broker.nack(&self.queue, delivery.tag, true).await?;
                Ok(Outcome::Retry)
            }
            Err(e) => {
                tracing::error!("Message {} dead-lettered: {}", delivery.message_id, e);
                self.broker.nack(&self.queue, delivery.tag, false).await?;
                Ok(Outcome::DeadLetter)
            }
        }
    }

    async fn apply(&self, delivery: &Delivery) -> Result<i64, PipelineError> {
        let message: OrderMessage = serde_json::from_str(&delivery.body)?;

        let order_id = self
            .orders
            .insert_order_from_message(&delivery.message_id, message.user_id, message.product_id)
            .await?;

        if let Err(e) = self
            .products
            .decrement_stock_by_one(&delivery.message_id, message.product_id)
            .await
        {
            if e.is_permanent() {
                // The order row must not claim a sale that never took stock.
                self.orders
                    .update_order_status(order_id, OrderStatus::Failed)
                    .await?;
            }
            return Err(e.into());
        }

        self.orders
            .update_order_status(order_id, OrderStatus::Success)
            .await?;
        Ok(order_id)
    }
}
