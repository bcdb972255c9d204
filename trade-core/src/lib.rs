//! Core types for the trade order feed
//!
//! This crate defines the shared data structures used across the workspace:
//! order records, the validated order input, and the event envelope pushed
//! to streaming subscribers.

pub mod error;
pub mod event;
pub mod order;

pub use error::{TradeError, TradeResult};
pub use event::EventEnvelope;
pub use order::{NewOrder, Order, OrderRequest, OrderType};
