//! WebSocket infrastructure for the live order feed
//!
//! This module tracks connected streaming subscribers and fans out
//! order events to all of them.

mod broadcaster;
mod error;
mod monitor;
mod registry;

pub use broadcaster::{BroadcastReport, Broadcaster, DEFAULT_SEND_TIMEOUT};
pub use error::{ConnectionSetupError, DeliveryFailure};
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry, SubscriberState};

/// Frame type carried by subscriber transports
pub type Frame = tokio_tungstenite::tungstenite::Message;

#[cfg(test)]
pub(crate) mod test_transport;
