//! Device key material.
//!
//! A [`DeviceKey`] is the 256-bit per-installation secret. Its canonical
//! text form is 64 lowercase hex characters, which is what secure storage
//! holds and what the envelope API accepts.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::entropy::{random_array, EntropySource};
use crate::error::{CryptoError, Result};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the canonical hex form.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

/// A 256-bit symmetric device key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DeviceKey([u8; KEY_LEN]);

impl DeviceKey {
    /// Generate a new random key from `source`.
    pub fn generate(source: &dyn EntropySource) -> Result<Self> {
        Ok(Self(random_array(source)?))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from hex. Must decode to exactly 32 bytes.
    ///
    /// Uppercase digits are accepted; [`DeviceKey::to_hex`] always emits
    /// lowercase.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != KEY_HEX_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} hex characters, got {}",
                KEY_HEX_LEN,
                s.len()
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Canonical lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short, non-secret identifier for logs.
    ///
    /// Derived with a Blake3 keyed context so it reveals nothing usable about
    /// the key itself.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new_derive_key("safereport-v1-key-fingerprint");
        hasher.update(&self.0);
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceKey({})", self.fingerprint())
    }
}

impl std::str::FromStr for DeviceKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::OsEntropy;

    #[test]
    fn test_hex_roundtrip() {
        let key = DeviceKey::generate(&OsEntropy).unwrap();
        let hex = key.to_hex();
        assert_eq!(hex.len(), KEY_HEX_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(DeviceKey::from_hex(&hex).unwrap(), key);
    }

    #[test]
    fn test_uppercase_accepted() {
        let key = DeviceKey::from_bytes([0xab; 32]);
        let upper = key.to_hex().to_uppercase();
        assert_eq!(DeviceKey::from_hex(&upper).unwrap(), key);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            DeviceKey::from_hex("abcd"),
            Err(CryptoError::InvalidKey(_))
        ));
        let long = "a".repeat(66);
        assert!(matches!(
            DeviceKey::from_hex(&long),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            DeviceKey::from_hex(&bad),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = DeviceKey::from_bytes([0x42; 32]);
        let debug = format!("{:?}", key);
        assert!(!debug.contains(&key.to_hex()));
        assert!(debug.contains(&key.fingerprint()));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = DeviceKey::from_bytes([1; 32]);
        let b = DeviceKey::from_bytes([2; 32]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
