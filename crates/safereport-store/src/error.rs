//! Error types for the store module.

use safereport_core::CryptoError;
use thiserror::Error;

/// Errors that can occur during storage and key store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The secure storage backend cannot be reached.
    #[error("secure storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused access (locked device, missing entitlement).
    #[error("secure storage access denied: {0}")]
    AccessDenied(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored key exists but is not a valid 256-bit hex key.
    #[error("stored key {id} is corrupt")]
    CorruptKey { id: String },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Key generation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl StoreError {
    /// Wrap a failed blocking task.
    pub(crate) fn join(e: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("spawn_blocking failed: {}", e))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
