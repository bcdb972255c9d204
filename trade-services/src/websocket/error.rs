//! Errors raised by subscriber transports

use thiserror::Error;

/// Registration failed before the subscriber entered the live set
#[derive(Error, Debug)]
pub enum ConnectionSetupError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Handshake timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A send to one subscriber failed
///
/// Never returned from a broadcast; the subscriber is pruned instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("subscriber disconnected")]
    Closed,

    #[error("send timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}
