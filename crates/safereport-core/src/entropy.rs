//! Secure random source.
//!
//! Every IV, salt, and device key comes through an [`EntropySource`]. There is
//! no fallback generator: if the OS cannot supply random bytes the operation
//! fails with [`CryptoError::Entropy`].

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, Result};

/// A source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` entirely with random bytes, or fail.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CryptoError::Entropy(e.to_string()))
    }
}

impl<E: EntropySource + ?Sized> EntropySource for &E {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }
}

impl<E: EntropySource + ?Sized> EntropySource for std::sync::Arc<E> {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }
}

/// Draw a fixed-size array from `source`.
pub fn random_array<const N: usize>(source: &dyn EntropySource) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    source.fill(&mut bytes)?;
    Ok(bytes)
}
