//! Business logic services for the trade order feed
//!
//! This crate provides order persistence and the subscriber registry that
//! fans newly created orders out to every connected streaming client.

pub mod order_service;
pub mod order_store;
pub mod websocket;

pub use order_service::{OrderService, OrderServiceError};
pub use order_store::{OrderStore, OrderStoreError};
pub use websocket::{
    BroadcastReport, Broadcaster, ConnectionSetupError, DeliveryFailure, Frame, Subscriber,
    SubscriberId, SubscriberRegistry, SubscriberState, DEFAULT_SEND_TIMEOUT,
};
