//! # SafeReport Core
//!
//! Pure primitives for protecting report payloads on the device: the device
//! key type, the JSON envelope codec, and the passphrase codec.
//!
//! This crate contains no I/O and no storage. Where the device key lives and
//! how it is created is the job of `safereport-store`.
//!
//! ## Key Types
//!
//! - [`DeviceKey`] - 256-bit per-installation secret, canonical form is hex
//! - [`Envelope`] - IV + ciphertext of one JSON payload, tagged with version and algorithm
//! - [`PassphraseCodec`] - seals JSON under a configured passphrase
//! - [`EntropySource`] - where IVs, salts, and keys come from
//!
//! ## Usage
//!
//! ```rust
//! use safereport_core::{decrypt, encrypt, EnvelopeAlgorithm};
//! use serde_json::json;
//!
//! let key_hex = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
//! let report = json!({"type": "safety_report", "location": "Main St"});
//!
//! let envelope = encrypt(&report, key_hex, EnvelopeAlgorithm::Aes256Gcm).unwrap();
//! assert_eq!(decrypt(&envelope, key_hex).unwrap(), report);
//! ```

pub mod cipher;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod key;
pub mod passphrase;

pub use entropy::{EntropySource, OsEntropy};
pub use envelope::{decrypt, decrypt_value, encrypt, Envelope, EnvelopeAlgorithm, ENVELOPE_VERSION};
pub use error::{CryptoError, Result};
pub use key::{DeviceKey, KEY_HEX_LEN, KEY_LEN};
pub use passphrase::{KdfParams, PassphraseCodec};
