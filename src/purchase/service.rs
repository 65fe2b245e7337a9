use crate::access::AccessControl;
use crate::admission::AdmissionClient;
use crate::error::AccessError;
use crate::identity::IdentityCookies;
use crate::pipeline::{MessageId, OrderMessage, OrderProducer};

use axum::http::HeaderMap;
use std::fmt;
use std::sync::Arc;

/// Why an attempt answered `false`. Never shown to the caller.
#[derive(Debug)]
pub enum Rejection {
    MissingProduct,
    InvalidProduct(String),
    Unauthenticated(AccessError),
    Unauthorized,
    SoldOut,
    PublishFailed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingProduct => write!(f, "missing productID"),
            Rejection::InvalidProduct(raw) => write!(f, "invalid productID `{}`", raw),
            Rejection::Unauthenticated(e) => write!(f, "{}", e),
            Rejection::Unauthorized => write!(f, "distributed authorization denied"),
            Rejection::SoldOut => write!(f, "inventory gate refused"),
            Rejection::PublishFailed(e) => write!(f, "publish failed: {}", e),
        }
    }
}

pub struct PurchaseService {
    access: Arc<AccessControl>,
    gate: Arc<AdmissionClient>,
    producer: Arc<OrderProducer>,
}

impl PurchaseService {
    pub fn new(
        access: Arc<AccessControl>,
        gate: Arc<AdmissionClient>,
        producer: Arc<OrderProducer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            access,
            gate,
            producer,
        })
    }

    /// Runs one purchase attempt end to end.
    ///
    /// Ids are parsed before the gate is called so a malformed request never
    /// consumes a unit of stock.
    pub async fn attempt(
        &self,
        headers: &HeaderMap,
        product: Option<&str>,
    ) -> Result<MessageId, Rejection> {
        let raw_product = product.ok_or(Rejection::MissingProduct)?;
        let product_id: i64 = raw_product
            .parse()
            .map_err(|_| Rejection::InvalidProduct(raw_product.to_string()))?;

        let cookies = IdentityCookies::from_headers(headers).map_err(Rejection::Unauthenticated)?;
        let user_id = cookies.user_id().map_err(Rejection::Unauthenticated)?;

        if !self.access.is_authorized(headers).await {
            return Err(Rejection::Unauthorized);
        }

        if !self.gate.claim(&cookies).await {
            return Err(Rejection::SoldOut);
        }

        self.producer
            .publish(OrderMessage::new(user_id, product_id))
            .await
            .map_err(|e| {
                // The gate unit is already spent. A publish that timed out may still have
                // been enqueued, so the caller can see a failure for an order that persists.
                tracing::error!(
                    "Granted purchase for user {} could not be queued: {}",
                    user_id,
                    e
                );
                Rejection::PublishFailed(e.to_string())
            })
    }
}
