//! # SafeReport Store
//!
//! Secure storage abstraction and the device key store.
//!
//! ## Overview
//!
//! The key store needs only a keychain-like collaborator: read a string by
//! id, write a string by id with an access policy. That contract is the
//! [`SecureStorage`] trait. [`RecordStore`] adds a local cache for sealed
//! envelopes.
//!
//! ## Key Types
//!
//! - [`KeyStore`] - `get_or_create_key()`, one stable key per device
//! - [`SecureStorage`] - async trait for secret persistence
//! - [`KeyringStorage`] - platform keychain via the `keyring` crate; where device keys belong
//! - [`SqliteStorage`] - file-backed record cache, plus secret storage for tooling and tests
//! - [`MemoryStorage`] - in-memory storage for tests
//! - [`RecordStore`] / [`SealedRecord`] - cached envelopes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use safereport_store::{KeyStore, KeyringStorage};
//!
//! async fn example() {
//!     let keystore = KeyStore::new(Arc::new(KeyringStorage::new()));
//!
//!     let key_hex = keystore.get_or_create_key_hex().await.unwrap();
//!     assert_eq!(key_hex.len(), 64);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Versioned id**: keys live under `sr_key_v1`; a future format gets a new id
//! - **Restrictive policy**: keys are written `WhenUnlockedThisDeviceOnly`
//! - **No substitutes**: storage failures propagate, a corrupt key is never replaced
//! - **Keys apart from data**: [`SqliteStorage`] keeps secrets in plaintext
//!   rows, so production keys go to [`KeyringStorage`] and SQLite holds envelopes

pub mod error;
pub mod keychain;
pub mod keystore;
mod locks;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use keychain::KeyringStorage;
pub use keystore::{KeyStore, DEFAULT_KEY_ID};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{AccessPolicy, RecordStore, SealedRecord, SecureStorage};
