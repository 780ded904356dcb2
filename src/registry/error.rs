//! Registry error types

use thiserror::Error;

use super::subscriber::SubscriberId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A subscriber with this id is already registered
    #[error("subscriber already registered: {0}")]
    AlreadyRegistered(SubscriberId),
}
