//! Error types for the session.

use safereport_core::CryptoError;
use safereport_store::StoreError;
use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Storage error, including key store failures.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Key, envelope, or passphrase error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation needs a setting the session was built without.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// Record not found in the local cache.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// A blocking-pool task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SessionError {
    /// Whether this is the opaque decryption failure (wrong key, corruption, tampering).
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, SessionError::Crypto(CryptoError::Decryption))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
