//! # SafeReport Testkit
//!
//! Testing utilities for SafeReport.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Known-answer vectors**: fixed key, IV, and plaintext with the exact expected envelope
//! - **Generators**: Proptest strategies for JSON payloads, keys, and reports
//! - **Fixtures**: sessions over memory storage, scripted and failing entropy, locked storage
//!
//! ## Vectors
//!
//! ```rust
//! use safereport_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, detail) in verify_all_vectors() {
//!     assert!(passed, "{}: {}", name, detail);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use safereport_testkit::generators::{algorithm, device_key, json_value};
//! use safereport_core::Envelope;
//!
//! proptest! {
//!     #[test]
//!     fn seal_then_open(value in json_value(), key in device_key(), alg in algorithm()) {
//!         let envelope = Envelope::seal(&value, &key, alg).unwrap();
//!         prop_assert_eq!(envelope.open::<serde_json::Value>(&key).unwrap(), value);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{FailingEntropy, IncidentReport, LockedStorage, ScriptedEntropy, TestFixture};
pub use generators::{algorithm, device_key, incident_report, json_value, key_hex};
pub use vectors::{envelope_vectors, passphrase_vectors, verify_all_vectors, EnvelopeVector};
