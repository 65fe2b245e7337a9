//! Queue Broker
//!
//! `Broker` is the seam between the pipeline and whatever holds the queue.
//! `InMemoryBroker` is the reference implementation, also served over HTTP by the
//! broker role.
//!
//! ## Delivery lifecycle
//! `ready` -> (`next_delivery`) -> `unacked` under a lease -> `ack` removes it,
//! `nack(requeue)` or lease expiry puts it back at the head of `ready`, and
//! `nack(no requeue)` or hitting `max_deliveries` moves it to the dead-letter list.
//!
//! A nacked message is held back for an exponential backoff before it is handed out
//! again. It keeps its place at the head, so nothing behind it overtakes it.

use super::types::{Delivery, DeliveryTag, MessageId};
use crate::error::BrokerError;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// How often a waiting consumer re-scans for expired leases.
const LEASE_SCAN_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, queue: &str, message_id: MessageId, body: String)
    -> Result<(), BrokerError>;

    /// Waits up to `wait` for a message. `Ok(None)` means the wait elapsed.
    async fn next_delivery(&self, queue: &str, wait: Duration)
    -> Result<Option<Delivery>, BrokerError>;

    async fn ack(&self, queue: &str, tag: DeliveryTag) -> Result<(), BrokerError>;

    async fn nack(&self, queue: &str, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError>;

    async fn stats(&self, queue: &str) -> Result<QueueStats, BrokerError>;
}

#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// Poison limit: a message delivered this many times without an ack is dead-lettered.
    pub max_deliveries: u32,
    /// How long a delivery may stay unacknowledged before it is redelivered.
    pub lease: Duration,
    /// Delay before the first redelivery of a nacked message; doubles on every attempt.
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
}

impl QueueSettings {
    /// Hold-back applied after the `deliveries`-th attempt was nacked.
    pub fn backoff_after(&self, deliveries: u32) -> Duration {
        let exponent = deliveries.saturating_sub(1).min(16);
        self.retry_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_retry_backoff)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            lease: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(100),
            max_retry_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub ready: usize,
    pub unacked: usize,
    pub dead_lettered: usize,
    pub published: u64,
    pub acked: u64,
}

#[derive(Debug, Clone)]
struct Envelope {
    message_id: MessageId,
    body: String,
    deliveries: u32,
    not_before: Option<Instant>,
}

enum Fetch {
    Ready(Delivery),
    /// The head is backing off until the given instant.
    Delayed(Instant),
    Empty,
}

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<Envelope>,
    unacked: HashMap<DeliveryTag, (Envelope, Instant)>,
    dead_letters: Vec<Envelope>,
    published: u64,
    acked: u64,
}

impl QueueInner {
    /// Returns an unacknowledged message to the head of the queue, or dead-letters it.
    fn requeue(
        &mut self,
        mut envelope: Envelope,
        max_deliveries: u32,
        not_before: Option<Instant>,
    ) {
        if envelope.deliveries >= max_deliveries {
            tracing::error!(
                "Message {} dead-lettered after {} deliveries",
                envelope.message_id,
                envelope.deliveries
            );
            self.dead_letters.push(envelope);
        } else {
            envelope.not_before = not_before;
            self.ready.push_front(envelope);
        }
    }

    fn reclaim_expired(&mut self, now: Instant, max_deliveries: u32) -> usize {
        let mut expired: Vec<DeliveryTag> = self
            .unacked
            .iter()
            .filter(|(_, (_, lease_expires))| *lease_expires <= now)
            .map(|(tag, _)| *tag)
            .collect();

        // Newest first: each one is pushed to the front, so the oldest ends up at the head.
        expired.sort_by_key(|tag| std::cmp::Reverse(tag.0));
        for tag in &expired {
            if let Some((envelope, _)) = self.unacked.remove(tag) {
                tracing::warn!(
                    "Lease expired for message {} (tag {}), redelivering",
                    envelope.message_id,
                    tag.0
                );
                self.requeue(envelope, max_deliveries, None);
            }
        }
        expired.len()
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            ready: self.ready.len(),
            unacked: self.unacked.len(),
            dead_lettered: self.dead_letters.len(),
            published: self.published,
            acked: self.acked,
        }
    }
}

#[derive(Default)]
struct QueueState {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl QueueState {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Named in-process queues. Queues are created on first use.
pub struct InMemoryBroker {
    queues: DashMap<String, Arc<QueueState>>,
    settings: QueueSettings,
    next_tag: AtomicU64,
}

impl InMemoryBroker {
    pub fn new(settings: QueueSettings) -> Arc<Self> {
        Arc::new(Self {
            queues: DashMap::new(),
            settings,
            next_tag: AtomicU64::new(1),
        })
    }

    fn queue(&self, name: &str) -> Arc<QueueState> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!("Declared queue {}", name);
                Arc::new(QueueState::default())
            })
            .clone()
    }

    fn take_next(&self, state: &QueueState) -> Fetch {
        let now = Instant::now();
        let mut inner = state.lock();
        inner.reclaim_expired(now, self.settings.max_deliveries);

        match inner.ready.front().and_then(|e| e.not_before) {
            Some(not_before) if not_before > now => return Fetch::Delayed(not_before),
            _ => {}
        }
        let Some(mut envelope) = inner.ready.pop_front() else {
            return Fetch::Empty;
        };
        envelope.deliveries += 1;
        envelope.not_before = None;
        let tag = DeliveryTag(self.next_tag.fetch_add(1, Ordering::SeqCst));
        let delivery = Delivery {
            tag,
            message_id: envelope.message_id.clone(),
            body: envelope.body.clone(),
            delivery_count: envelope.deliveries,
        };
        inner.unacked.insert(tag, (envelope, now + self.settings.lease));
        Fetch::Ready(delivery)
    }

    /// Message ids currently on the dead-letter list.
    pub fn dead_letters(&self, queue: &str) -> Vec<MessageId> {
        self.queue(queue)
            .lock()
            .dead_letters
            .iter()
            .map(|e| e.message_id.clone())
            .collect()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(
        &self,
        queue: &str,
        message_id: MessageId,
        body: String,
    ) -> Result<(), BrokerError> {
        let state = self.queue(queue);
        {
            let mut inner = state.lock();
            inner.ready.push_back(Envelope {
                message_id,
                body,
                deliveries: 0,
                not_before: None,
            });
            inner.published += 1;
        }
        state.notify.notify_waiters();
        Ok(())
    }

    async fn next_delivery(
        &self,
        queue: &str,
        wait: Duration,
    ) -> Result<Option<Delivery>, BrokerError> {
        let state = self.queue(queue);
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before looking, so a publish in between is not missed.
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready_at = match self.take_next(&state) {
                Fetch::Ready(delivery) => return Ok(Some(delivery)),
                Fetch::Delayed(at) => Some(at),
                Fetch::Empty => None,
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let mut nap = (deadline - now).min(LEASE_SCAN_INTERVAL);
            if let Some(at) = ready_at {
                nap = nap.min(at.saturating_duration_since(now));
            }
            let _ = tokio::time::timeout(nap, notified).await;
        }
    }

    async fn ack(&self, queue: &str, tag: DeliveryTag) -> Result<(), BrokerError> {
        let state = self.queue(queue);
        let mut inner = state.lock();
        match inner.unacked.remove(&tag) {
            Some((envelope, _)) => {
                inner.acked += 1;
                tracing::debug!("Acked message {} (tag {})", envelope.message_id, tag.0);
                Ok(())
            }
            None => Err(BrokerError::UnknownDelivery(tag.0)),
        }
    }

    async fn nack(&self, queue: &str, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError> {
        let state = self.queue(queue);
        {
            let mut inner = state.lock();
            let (envelope, _) = inner
                .unacked
                .remove(&tag)
                .ok_or(BrokerError::UnknownDelivery(tag.0))?;

            if requeue {
                let delay = self.settings.backoff_after(envelope.deliveries);
                tracing::debug!(
                    "Message {} requeued, redelivery in {:?}",
                    envelope.message_id,
                    delay
                );
                inner.requeue(
                    envelope,
                    self.settings.max_deliveries,
                    Some(Instant::now() + delay),
                );
            } else {
                tracing::warn!("Message {} rejected, dead-lettering", envelope.message_id);
                inner.dead_letters.push(envelope);
            }
        }
        state.notify.notify_waiters();
        Ok(())
    }

    async fn stats(&self, queue: &str) -> Result<QueueStats, BrokerError> {
        Ok(self.queue(queue).lock().stats())
    }
}
