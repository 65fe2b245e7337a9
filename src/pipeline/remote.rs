use super::broker::{Broker, QueueStats};
use super::protocol::*;
use super::types::{Delivery, DeliveryTag, MessageId};
use crate::error::BrokerError;

use async_trait::async_trait;
use std::time::Duration;

/// `Broker` backed by the broker service's HTTP API.
pub struct HttpBroker {
    base_url: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpBroker {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            request_timeout,
        }
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        queue: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<(), BrokerError> {
        let response = self
            .http_client
            .post(queue_url(&self.base_url, queue, endpoint))
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        let body: BrokerResponse = response.json().await?;
        if status.is_success() && body.success {
            Ok(())
        } else {
            Err(BrokerError::Rejected(
                body.error.unwrap_or_else(|| status.to_string()),
            ))
        }
    }
}

#[async_trait]
impl Broker for HttpBroker {
    async fn publish(
        &self,
        queue: &str,
        message_id: MessageId,
        body: String,
    ) -> Result<(), BrokerError> {
        self.post_json(queue, ENDPOINT_PUBLISH, &PublishRequest { message_id, body })
            .await
    }

    async fn next_delivery(
        &self,
        queue: &str,
        wait: Duration,
    ) -> Result<Option<Delivery>, BrokerError> {
        let wait_ms = (wait.as_millis() as u64).min(MAX_WAIT_MS);
        let response = self
            .http_client
            .get(queue_url(&self.base_url, queue, ENDPOINT_NEXT))
            .query(&[("wait_ms", wait_ms)])
            // The long-poll itself must not trip the request timeout.
            .timeout(self.request_timeout + Duration::from_millis(wait_ms))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrokerError::Rejected(response.status().to_string()));
        }
        let next: NextDeliveryResponse = response.json().await?;
        Ok(next.delivery)
    }

    async fn ack(&self, queue: &str, tag: DeliveryTag) -> Result<(), BrokerError> {
        self.post_json(queue, ENDPOINT_ACK, &AckRequest { tag }).await
    }

    async fn nack(&self, queue: &str, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError> {
        self.post_json(queue, ENDPOINT_NACK, &NackRequest { tag, requeue })
            .await
    }

    async fn stats(&self, queue: &str) -> Result<QueueStats, BrokerError> {
        let response = self
            .http_client
            .get(queue_url(&self.base_url, queue, ENDPOINT_STATS))
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BrokerError::Rejected(response.status().to_string()));
        }
        Ok(response.json().await?)
    }
}
