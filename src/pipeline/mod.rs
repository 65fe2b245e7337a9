//! Order Intake Pipeline
//!
//! Moves an admitted purchase off the request path and onto durable storage.
//!
//! ## Architecture Overview
//! 1. **Producer**: once the gate grants a unit, the node publishes an `OrderMessage`
//!    (`{"UserID": .., "ProductID": ..}`) to a named queue and answers the user.
//! 2. **Broker**: holds the queue. Deliveries stay unacknowledged under a lease until the
//!    consumer settles them; an expired lease means the consumer died and the message is
//!    redelivered (at-least-once). Messages over the poison limit are dead-lettered.
//! 3. **Consumer**: a single worker with one message in flight. It inserts the order,
//!    decrements stock, and acknowledges only when both succeeded.
//!
//! Both storage effects are idempotent per message id, so redelivery never double counts.
//!
//! ## Submodules
//! - **`types`**: message, delivery and domain model types.
//! - **`broker`**: the `Broker` trait and the in-memory queue implementation.
//! - **`remote`**: `Broker` over HTTP, for nodes talking to the broker service.
//! - **`store`**: `OrderStore` / `ProductStore` contracts and an in-memory store.
//! - **`producer`** / **`consumer`**: the two ends of the queue.
//! - **`protocol`** / **`handlers`**: the broker service HTTP API.

pub mod broker;
pub mod consumer;
pub mod handlers;
pub mod producer;
pub mod protocol;
pub mod remote;
pub mod store;
pub mod types;

pub use broker::{Broker, InMemoryBroker, QueueSettings, QueueStats};
pub use consumer::{OrderConsumer, Outcome};
pub use producer::OrderProducer;
pub use remote::HttpBroker;
pub use store::{InMemoryStore, OrderStore, ProductStore};
pub use types::{Delivery, DeliveryTag, MessageId, Order, OrderMessage, OrderStatus, Product};
