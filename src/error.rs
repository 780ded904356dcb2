//! Crate-level error type

use thiserror::Error;

use crate::registry::RegistryError;
use crate::rule::RuleError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Rule compilation failed
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// Registry operation failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// WebSocket protocol error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Underlying I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
