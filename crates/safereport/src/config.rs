//! Session configuration.
//!
//! The passphrase and key id are supplied here, either directly or from the
//! environment at deploy time. Nothing secret is compiled in.

use std::fmt;

use safereport_core::{EnvelopeAlgorithm, KdfParams};
use safereport_store::DEFAULT_KEY_ID;
use zeroize::Zeroizing;

use crate::error::{Result, SessionError};

/// Environment variable naming the device key storage id.
pub const ENV_KEY_ID: &str = "SAFEREPORT_KEY_ID";

/// Environment variable selecting the envelope algorithm for new payloads.
pub const ENV_ENVELOPE_ALG: &str = "SAFEREPORT_ENVELOPE_ALG";

/// Environment variable carrying the local-data passphrase.
pub const ENV_PASSPHRASE: &str = "SAFEREPORT_PASSPHRASE";

/// Passphrase codec settings.
#[derive(Clone)]
pub struct PassphraseConfig {
    /// The passphrase. Never logged, wiped on drop.
    pub passphrase: Zeroizing<String>,
    /// Argon2id cost for new ciphertexts.
    pub kdf: KdfParams,
}

impl PassphraseConfig {
    /// Passphrase with default KDF cost.
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.into()),
            kdf: KdfParams::default(),
        }
    }

    /// Override the KDF cost.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

impl fmt::Debug for PassphraseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseConfig")
            .field("passphrase", &"<redacted>")
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// Configuration for a [`CryptoSession`](crate::CryptoSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secure storage id of the device key.
    pub key_id: String,
    /// Algorithm for newly sealed envelopes.
    pub algorithm: EnvelopeAlgorithm,
    /// Passphrase codec settings, if local passphrase sealing is used.
    pub passphrase: Option<PassphraseConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_id: DEFAULT_KEY_ID.to_string(),
            algorithm: EnvelopeAlgorithm::Aes256Gcm,
            passphrase: None,
        }
    }
}

impl SessionConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key_id) = lookup(ENV_KEY_ID) {
            let key_id = key_id.trim();
            if key_id.is_empty() {
                return Err(SessionError::Config(format!("{} is empty", ENV_KEY_ID)));
            }
            config.key_id = key_id.to_string();
        }

        if let Some(alg) = lookup(ENV_ENVELOPE_ALG) {
            config.algorithm = alg.parse().map_err(|_| {
                SessionError::Config(format!("{}: unknown algorithm {:?}", ENV_ENVELOPE_ALG, alg))
            })?;
        }

        if let Some(passphrase) = lookup(ENV_PASSPHRASE) {
            if passphrase.is_empty() {
                return Err(SessionError::Config(format!("{} is empty", ENV_PASSPHRASE)));
            }
            config.passphrase = Some(PassphraseConfig::new(passphrase));
        }

        Ok(config)
    }

    /// Set the passphrase codec settings.
    pub fn with_passphrase(mut self, passphrase: PassphraseConfig) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    /// Set the algorithm for new envelopes.
    pub fn with_algorithm(mut self, algorithm: EnvelopeAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}
