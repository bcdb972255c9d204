//! Order Service
//!
//! Validates and persists submitted orders, then announces each stored order
//! to the live subscribers. Persistence and broadcast are separate steps: a
//! rejected or failed write is never broadcast, and a broadcast problem never
//! turns a stored order into a failure.

use std::sync::Arc;
use trade_core::{EventEnvelope, Order, OrderRequest, TradeError};
use tracing::{error, info};

use crate::order_store::{OrderStore, OrderStoreError};
use crate::websocket::{Broadcaster, SubscriberRegistry};

/// Order submission and listing backed by an [`OrderStore`]
#[derive(Clone)]
pub struct OrderService {
    store: Arc<OrderStore>,
    broadcaster: Broadcaster,
}

impl OrderService {
    pub fn new(store: Arc<OrderStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        self.broadcaster.registry()
    }

    /// Validate, persist and broadcast a new order
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order, OrderServiceError> {
        info!("Creating new order: {:?}", request);

        let new_order = request.validate()?;
        let order = self.store.insert(&new_order).map_err(|e| {
            error!("Error creating order: {}", e);
            OrderServiceError::Storage(e)
        })?;

        info!(
            "Stored order {} ({} {} {} @ {})",
            order.id, order.order_type, order.quantity, order.symbol, order.price
        );

        // Broadcast outcome is reported by the broadcaster itself
        self.broadcaster
            .broadcast(&EventEnvelope::from(order.clone()))
            .await;

        Ok(order)
    }

    /// Get all stored orders
    pub fn list_orders(&self) -> Result<Vec<Order>, OrderServiceError> {
        let orders = self.store.list()?;
        info!("Retrieved {} orders", orders.len());
        Ok(orders)
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}

/// Errors returned by [`OrderService`]
#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    /// The submission failed validation; nothing was stored
    #[error(transparent)]
    Invalid(#[from] TradeError),

    /// The store rejected the write or read
    #[error(transparent)]
    Storage(#[from] OrderStoreError),
}
