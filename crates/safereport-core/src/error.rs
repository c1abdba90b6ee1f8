//! Error types for SafeReport Core.

use thiserror::Error;

/// Errors that can occur while handling keys, envelopes, or passphrase blobs.
///
/// `Decryption` deliberately carries no detail: a bad padding, a failed
/// tag, broken UTF-8, and unparsable JSON all look the same to the caller.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material is malformed (wrong length or encoding).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Wrong key, corrupted data, or tampering.
    #[error("decryption failed")]
    Decryption,

    /// The value could not be serialized to JSON.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The cipher refused to encrypt.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Envelope format version this build does not understand.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u16),

    /// The secure random source could not supply bytes.
    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    /// Passphrase key derivation failed or its parameters are out of range.
    #[error("key derivation error: {0}")]
    Kdf(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
