//! Storage Contracts
//!
//! The pipeline only needs two narrow capabilities from the system of record. Both
//! writes take the message id so that a redelivered message is applied at most once.

use super::types::{MessageId, Order, OrderStatus, Product};
use crate::error::StoreError;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Upserts the order created by `message_id`; returns the (possibly existing) order id.
    /// New orders start out as `Wait`.
    async fn insert_order_from_message(
        &self,
        message_id: &MessageId,
        user_id: i64,
        product_id: i64,
    ) -> Result<i64, StoreError>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatus)
    -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product_by_id(&self, id: i64) -> Result<Product, StoreError>;

    async fn update_product(&self, product: Product) -> Result<(), StoreError>;

    /// Removes one unit of stock for `message_id`. Re-applying the same message is a no-op.
    async fn decrement_stock_by_one(
        &self,
        message_id: &MessageId,
        product_id: i64,
    ) -> Result<(), StoreError>;
}

/// In-memory system of record used by the consumer role and tests.
pub struct InMemoryStore {
    products: DashMap<i64, Product>,
    orders: DashMap<i64, Order>,
    orders_by_message: DashMap<MessageId, i64>,
    applied_decrements: DashMap<MessageId, i64>,
    next_order_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_products<I>(products: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Product>,
    {
        let store = Self::default();
        for product in products {
            store.products.insert(product.id, product);
        }
        Arc::new(store)
    }

    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.iter().map(|e| e.value().clone()).collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    pub fn order_status(&self, order_id: i64) -> Option<OrderStatus> {
        self.orders.get(&order_id).map(|o| o.status)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn stock_of(&self, product_id: i64) -> Option<i64> {
        self.products.get(&product_id).map(|p| p.number)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            products: DashMap::new(),
            orders: DashMap::new(),
            orders_by_message: DashMap::new(),
            applied_decrements: DashMap::new(),
            next_order_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order_from_message(
        &self,
        message_id: &MessageId,
        user_id: i64,
        product_id: i64,
    ) -> Result<i64, StoreError> {
        match self.orders_by_message.entry(message_id.clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!("Order for message {} already exists", message_id);
                Ok(*existing.get())
            }
            Entry::Vacant(slot) => {
                let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
                self.orders.insert(
                    id,
                    Order {
                        id,
                        user_id,
                        product_id,
                        status: OrderStatus::Wait,
                    },
                );
                slot.insert(id);
                Ok(id)
            }
        }
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = status;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn get_product_by_id(&self, id: i64) -> Result<Product, StoreError> {
        self.products
            .get(&id)
            .map(|p| p.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_product(&self, product: Product) -> Result<(), StoreError> {
        match self.products.get_mut(&product.id) {
            Some(mut existing) => {
                *existing = product;
                Ok(())
            }
            None => Err(StoreError::NotFound(product.id)),
        }
    }

    async fn decrement_stock_by_one(
        &self,
        message_id: &MessageId,
        product_id: i64,
    ) -> Result<(), StoreError> {
        // The dedup entry stays locked until the decrement is recorded.
        let slot = match self.applied_decrements.entry(message_id.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!("Stock decrement for message {} already applied", message_id);
                return Ok(());
            }
            Entry::Vacant(slot) => slot,
        };

        let mut product = self
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound(product_id))?;
        if product.number <= 0 {
            return Err(StoreError::OutOfStock(product_id));
        }
        product.number -= 1;
        drop(product);

        slot.insert(product_id);
        Ok(())
    }
}
