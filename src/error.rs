//! Error types for CuckooCache

use thiserror::Error;

use crate::proto::ProtocolError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running a cache node
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// Cache capacity must hold at least one entry
    #[error("Invalid cache capacity: {capacity} (must be > 0)")]
    InvalidCapacity { capacity: usize },

    /// Replication needs a primary and a distinct secondary
    #[error("At least {required} distinct members are required, got {actual}")]
    InsufficientMembers { required: usize, actual: usize },

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Wire protocol violation
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error was raised while constructing a component
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::InvalidCapacity { .. } | Error::InsufficientMembers { .. }
        )
    }
}
