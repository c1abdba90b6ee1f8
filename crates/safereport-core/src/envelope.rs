//! JSON envelope codec.
//!
//! An [`Envelope`] is what leaves the device or lands in the local cache:
//! a base64 IV and a base64 ciphertext of the UTF-8 JSON plaintext, tagged
//! with a format version and algorithm.
//!
//! ## Wire format
//!
//! ```json
//! { "v": 1, "alg": "aes-256-gcm", "ivBase64": "...", "ciphertextBase64": "..." }
//! ```
//!
//! Envelopes written by earlier app versions have only `ivBase64` and
//! `ciphertextBase64`. They parse as version 0 with `alg` defaulting to
//! `aes-256-cbc`.
//!
//! ## Known weakness
//!
//! AES-256-CBC has no integrity tag. A flipped ciphertext byte usually breaks
//! the padding or the JSON and surfaces as [`CryptoError::Decryption`], but a
//! flip can also decode to different valid JSON without detection. Use
//! AES-256-GCM for anything new.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cipher::{self, CBC_IV_LEN, GCM_NONCE_LEN};
use crate::entropy::{random_array, EntropySource, OsEntropy};
use crate::error::{CryptoError, Result};
use crate::key::DeviceKey;

/// Version written by this build.
pub const ENVELOPE_VERSION: u16 = 1;

/// Version assigned to untagged envelopes.
pub const LEGACY_VERSION: u16 = 0;

/// Cipher used for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnvelopeAlgorithm {
    /// AES-256-CBC, PKCS#7 padding, 16-byte IV. Not authenticated.
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
    /// AES-256-GCM, 12-byte nonce, 16-byte tag.
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl EnvelopeAlgorithm {
    /// Wire name of the algorithm.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EnvelopeAlgorithm::Aes256Cbc => "aes-256-cbc",
            EnvelopeAlgorithm::Aes256Gcm => "aes-256-gcm",
        }
    }

    /// IV / nonce length for this algorithm.
    pub const fn iv_len(&self) -> usize {
        match self {
            EnvelopeAlgorithm::Aes256Cbc => CBC_IV_LEN,
            EnvelopeAlgorithm::Aes256Gcm => GCM_NONCE_LEN,
        }
    }

    /// Whether tampering is always detected.
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, EnvelopeAlgorithm::Aes256Gcm)
    }
}

impl std::fmt::Display for EnvelopeAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvelopeAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-256-cbc" => Ok(EnvelopeAlgorithm::Aes256Cbc),
            "aes-256-gcm" => Ok(EnvelopeAlgorithm::Aes256Gcm),
            other => Err(CryptoError::Encoding(format!(
                "unknown envelope algorithm: {}",
                other
            ))),
        }
    }
}

fn legacy_version() -> u16 {
    LEGACY_VERSION
}

/// An encrypted JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Format version. Missing on legacy envelopes.
    #[serde(rename = "v", default = "legacy_version")]
    pub version: u16,

    /// Cipher used. Missing on legacy envelopes, which are always CBC.
    #[serde(default)]
    pub alg: EnvelopeAlgorithm,

    /// Base64 IV (CBC) or nonce (GCM), fresh per encryption.
    #[serde(rename = "ivBase64")]
    pub iv_base64: String,

    /// Base64 ciphertext of the UTF-8 JSON plaintext.
    #[serde(rename = "ciphertextBase64")]
    pub ciphertext_base64: String,
}

impl Envelope {
    /// Seal a value under `key` using the OS random source.
    pub fn seal<T: Serialize + ?Sized>(
        value: &T,
        key: &DeviceKey,
        alg: EnvelopeAlgorithm,
    ) -> Result<Self> {
        Self::seal_with(value, key, alg, &OsEntropy)
    }

    /// Seal a value under `key`, drawing the IV from `entropy`.
    ///
    /// JSON serialization happens first so that a value that cannot be
    /// encoded never consumes entropy or touches the cipher.
    pub fn seal_with<T: Serialize + ?Sized>(
        value: &T,
        key: &DeviceKey,
        alg: EnvelopeAlgorithm,
        entropy: &dyn EntropySource,
    ) -> Result<Self> {
        let plaintext =
            serde_json::to_vec(value).map_err(|e| CryptoError::Encoding(e.to_string()))?;

        let (iv, ciphertext) = match alg {
            EnvelopeAlgorithm::Aes256Cbc => {
                let iv: [u8; CBC_IV_LEN] = random_array(entropy)?;
                let ct = cipher::cbc_encrypt(key, &iv, &plaintext)?;
                (iv.to_vec(), ct)
            }
            EnvelopeAlgorithm::Aes256Gcm => {
                let nonce: [u8; GCM_NONCE_LEN] = random_array(entropy)?;
                let ct = cipher::gcm_encrypt(key, &nonce, &plaintext)?;
                (nonce.to_vec(), ct)
            }
        };

        Ok(Self {
            version: ENVELOPE_VERSION,
            alg,
            iv_base64: STANDARD.encode(iv),
            ciphertext_base64: STANDARD.encode(ciphertext),
        })
    }

    /// Open the envelope and parse the plaintext as `T`.
    ///
    /// Every failure after the version check is reported as
    /// [`CryptoError::Decryption`].
    pub fn open<T: DeserializeOwned>(&self, key: &DeviceKey) -> Result<T> {
        let plaintext = self.open_bytes(key)?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::Decryption)?;
        serde_json::from_str(text).map_err(|_| CryptoError::Decryption)
    }

    /// Open the envelope and return the raw plaintext bytes.
    pub fn open_bytes(&self, key: &DeviceKey) -> Result<Vec<u8>> {
        if self.version > ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(self.version));
        }

        let iv = STANDARD
            .decode(&self.iv_base64)
            .map_err(|_| CryptoError::Decryption)?;
        let ciphertext = STANDARD
            .decode(&self.ciphertext_base64)
            .map_err(|_| CryptoError::Decryption)?;

        if iv.len() != self.alg.iv_len() {
            return Err(CryptoError::Decryption);
        }

        match self.alg {
            EnvelopeAlgorithm::Aes256Cbc => cipher::cbc_decrypt(key, &iv, &ciphertext),
            EnvelopeAlgorithm::Aes256Gcm => cipher::gcm_decrypt(key, &iv, &ciphertext),
        }
    }

    /// Whether this envelope predates version tagging.
    pub fn is_legacy(&self) -> bool {
        self.version == LEGACY_VERSION
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    /// Parse from the JSON wire form.
    ///
    /// A malformed wire object is treated as a corrupted envelope.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|_| CryptoError::Decryption)
    }
}

/// Encrypt a JSON-serializable value under a hex key.
pub fn encrypt<T: Serialize + ?Sized>(
    value: &T,
    key_hex: &str,
    alg: EnvelopeAlgorithm,
) -> Result<Envelope> {
    let key = DeviceKey::from_hex(key_hex)?;
    Envelope::seal(value, &key, alg)
}

/// Decrypt an envelope under a hex key into a JSON value.
pub fn decrypt(envelope: &Envelope, key_hex: &str) -> Result<serde_json::Value> {
    decrypt_value(envelope, key_hex)
}

/// Decrypt an envelope under a hex key into a typed value.
///
/// A payload that is valid JSON but not a `T` is a decryption failure.
pub fn decrypt_value<T: DeserializeOwned>(envelope: &Envelope, key_hex: &str) -> Result<T> {
    let key = DeviceKey::from_hex(key_hex)?;
    envelope.open(&key)
}
