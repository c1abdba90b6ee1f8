//! Passphrase-sealed JSON blobs.
//!
//! For local data that does not go through the device key. The passphrase is
//! supplied by configuration; a fresh salt and nonce are drawn per call and
//! recorded in the output string together with the KDF parameters:
//!
//! ```text
//! srp1$argon2id$m=19456,t=2,p=1$<salt b64>$<nonce b64>$<ciphertext b64>
//! ```
//!
//! The key is derived with Argon2id and the payload sealed with
//! ChaCha20-Poly1305. Everything up to and including the parameter block is
//! bound to the ciphertext as associated data.

use std::fmt;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::entropy::{random_array, EntropySource, OsEntropy};
use crate::error::{CryptoError, Result};

/// Format tag at the start of every passphrase ciphertext.
pub const FORMAT_TAG: &str = "srp1";

const KDF_TAG: &str = "argon2id";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Upper bounds accepted when reading parameters back out of a ciphertext.
const MAX_MEMORY_KIB: u32 = 256 * 1024;
const MAX_ITERATIONS: u32 = 16;
const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use for real data.
    pub const fn insecure_for_tests() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations == 0
            || self.iterations > MAX_ITERATIONS
            || self.parallelism == 0
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::Kdf(format!(
                "parameters out of range: m={}, t={}, p={}",
                self.memory_kib, self.iterations, self.parallelism
            )));
        }
        Ok(())
    }

    fn encode(&self) -> String {
        format!(
            "m={},t={},p={}",
            self.memory_kib, self.iterations, self.parallelism
        )
    }

    fn decode(s: &str) -> Option<Self> {
        let mut memory_kib = None;
        let mut iterations = None;
        let mut parallelism = None;

        for part in s.split(',') {
            let (name, value) = part.split_once('=')?;
            let value: u32 = value.parse().ok()?;
            match name {
                "m" => memory_kib = Some(value),
                "t" => iterations = Some(value),
                "p" => parallelism = Some(value),
                _ => return None,
            }
        }

        let params = Self {
            memory_kib: memory_kib?,
            iterations: iterations?,
            parallelism: parallelism?,
        };
        // Only the canonical spelling authenticates: the AAD is the re-encoded header.
        (params.encode() == s).then_some(params)
    }

    fn derive_key(&self, passphrase: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        self.validate()?;
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(passphrase, salt, key.as_mut())
            .map_err(|e| CryptoError::Kdf(e.to_string()))?;
        Ok(key)
    }
}

/// Seals JSON values under a configured passphrase.
#[derive(Clone)]
pub struct PassphraseCodec {
    passphrase: Zeroizing<String>,
    params: KdfParams,
    entropy: Arc<dyn EntropySource>,
}

impl PassphraseCodec {
    /// Create a codec with default KDF parameters and the OS random source.
    ///
    /// An empty passphrase is rejected.
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        Self::with_params(passphrase, KdfParams::default())
    }

    /// Create a codec with explicit KDF parameters.
    pub fn with_params(passphrase: impl Into<String>, params: KdfParams) -> Result<Self> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(CryptoError::InvalidKey("passphrase is empty".into()));
        }
        params.validate()?;
        Ok(Self {
            passphrase,
            params,
            entropy: Arc::new(OsEntropy),
        })
    }

    /// Replace the random source.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// KDF parameters used for new ciphertexts.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Serialize `value` to JSON and seal it into a self-describing string.
    pub fn encrypt_data<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(value).map_err(|e| CryptoError::Encoding(e.to_string()))?,
        );

        let salt: [u8; SALT_LEN] = random_array(self.entropy.as_ref())?;
        let nonce: [u8; NONCE_LEN] = random_array(self.entropy.as_ref())?;
        let key = self.params.derive_key(self.passphrase.as_bytes(), &salt)?;

        let header = format!("{}${}${}", FORMAT_TAG, KDF_TAG, self.params.encode());
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: header.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(format!(
            "{}${}${}${}",
            header,
            STANDARD.encode(salt),
            STANDARD.encode(nonce),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Open a string produced by [`PassphraseCodec::encrypt_data`].
    ///
    /// Parameters are read from the string itself. Malformed input, a wrong
    /// passphrase, and tampering all yield [`CryptoError::Decryption`];
    /// parameters beyond the accepted maxima yield [`CryptoError::Kdf`].
    pub fn decrypt_data<T: DeserializeOwned>(&self, ciphertext: &str) -> Result<T> {
        let parts: Vec<&str> = ciphertext.split('$').collect();
        let [tag, kdf, params, salt, nonce, body] = parts.as_slice() else {
            return Err(CryptoError::Decryption);
        };
        if *tag != FORMAT_TAG || *kdf != KDF_TAG {
            return Err(CryptoError::Decryption);
        }

        let params = KdfParams::decode(params).ok_or(CryptoError::Decryption)?;
        let salt = STANDARD.decode(salt).map_err(|_| CryptoError::Decryption)?;
        let nonce = STANDARD.decode(nonce).map_err(|_| CryptoError::Decryption)?;
        let body = STANDARD.decode(body).map_err(|_| CryptoError::Decryption)?;
        if salt.len() != SALT_LEN || nonce.len() != NONCE_LEN {
            return Err(CryptoError::Decryption);
        }

        let key = params.derive_key(self.passphrase.as_bytes(), &salt)?;
        let header = format!("{}${}${}", FORMAT_TAG, KDF_TAG, params.encode());
        let cipher =
            ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| CryptoError::Decryption)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: body.as_slice(),
                        aad: header.as_bytes(),
                    },
                )
                .map_err(|_| CryptoError::Decryption)?,
        );

        let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::Decryption)?;
        serde_json::from_str(text).map_err(|_| CryptoError::Decryption)
    }
}

impl fmt::Debug for PassphraseCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseCodec")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
