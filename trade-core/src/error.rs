//! Error types for the trade order feed

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TradeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TradeError::Validation(msg.into())
    }

    /// Whether the error was caused by bad client input
    pub fn is_validation(&self) -> bool {
        matches!(self, TradeError::Validation(_))
    }
}

/// Result type alias for trade operations
pub type TradeResult<T> = Result<T, TradeError>;
