//! Event envelope pushed to streaming subscribers
//!
//! Every delivered message is a single JSON object of the form
//! `{"event": <kind>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::error::TradeResult;
use crate::order::Order;

/// A broadcastable occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// An order was persisted
    NewOrder(Order),
}

impl EventEnvelope {
    /// The `event` field as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            EventEnvelope::NewOrder(_) => "new_order",
        }
    }

    /// Serialize to the JSON text carried by one transport frame
    pub fn to_json(&self) -> TradeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Order> for EventEnvelope {
    fn from(order: Order) -> Self {
        EventEnvelope::NewOrder(order)
    }
}
