//! # SafeReport
//!
//! On-device protection for incident reports: a per-installation device
//! key, JSON envelopes sealed under it, and passphrase-sealed blobs for
//! local data.
//!
//! ## Overview
//!
//! - **Device key**: 256 bits, created once per installation and kept in
//!   secure storage under a versioned id (`sr_key_v1`)
//! - **Envelopes**: `{v, alg, ivBase64, ciphertextBase64}`, AES-256-GCM by
//!   default, AES-256-CBC for payloads written by older app versions
//! - **Passphrase blobs**: Argon2id + ChaCha20-Poly1305, one self-describing
//!   string
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use safereport::{CryptoSession, SessionConfig};
//! use safereport::store::{KeyringStorage, SqliteStorage};
//! use serde_json::{json, Value};
//!
//! async fn example() -> safereport::Result<()> {
//!     // The device key lives in the platform keychain; SQLite only ever
//!     // holds sealed envelopes.
//!     let records = Arc::new(SqliteStorage::open("reports.db")?);
//!     let session = CryptoSession::new(KeyringStorage::new(), SessionConfig::from_env()?)?
//!         .with_record_cache(records);
//!
//!     let report = json!({"type": "safety_report", "location": "Main St"});
//!     let envelope = session.cache_report("report-1", &report).await?;
//!
//!     let opened: Value = session.open(&envelope).await?;
//!     assert_eq!(opened, report);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `safereport::core` - key, envelope, and passphrase primitives
//! - `safereport::store` - secure storage backends and the key store

pub mod config;
pub mod error;
pub mod session;

// Re-export component crates
pub use safereport_core as core;
pub use safereport_store as store;

// Re-export main types for convenience
pub use config::{PassphraseConfig, SessionConfig};
pub use error::{Result, SessionError};
pub use session::{CryptoSession, NoRecordCache};

// Re-export commonly used types
pub use safereport_core::{DeviceKey, Envelope, EnvelopeAlgorithm, KdfParams};
pub use safereport_store::{AccessPolicy, KeyringStorage, MemoryStorage, SqliteStorage};
