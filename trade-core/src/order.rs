//! Order data structures
//!
//! [`OrderRequest`] is what a client submits, [`NewOrder`] is the validated
//! form handed to storage, and [`Order`] is the persisted record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TradeError, TradeResult};

/// Side of a trade order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(OrderType::Buy),
            "sell" => Ok(OrderType::Sell),
            _ => Err(TradeError::validation(
                "order_type must be either \"buy\" or \"sell\"",
            )),
        }
    }
}

/// Order submission as received from a client, before validation
///
/// `order_type` is kept as a raw string so that an unknown side is reported
/// as a validation error rather than a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub price: f64,
    pub quantity: i64,
    pub order_type: String,
}

impl OrderRequest {
    /// Validate the request into a [`NewOrder`]
    pub fn validate(self) -> TradeResult<NewOrder> {
        let order_type = self.order_type.parse()?;
        NewOrder::new(self.symbol, self.price, self.quantity, order_type)
    }
}

/// A validated order that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    symbol: String,
    price: f64,
    quantity: i64,
    order_type: OrderType,
}

impl NewOrder {
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        quantity: i64,
        order_type: OrderType,
    ) -> TradeResult<Self> {
        let symbol = symbol.into().trim().to_string();
        if symbol.is_empty() {
            return Err(TradeError::validation("symbol must not be empty"));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(TradeError::validation("price must be positive"));
        }
        if quantity <= 0 {
            return Err(TradeError::validation("quantity must be positive"));
        }

        Ok(Self {
            symbol,
            price,
            quantity,
            order_type,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }
}

/// A persisted trade order
///
/// `id` and `created_at` are assigned by the store. Orders are never updated
/// once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub symbol: String,
    pub price: f64,
    pub quantity: i64,
    pub order_type: OrderType,
    /// Creation time, serialized as an ISO-8601 string
    pub created_at: DateTime<Utc>,
}
