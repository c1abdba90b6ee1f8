//! Block-cipher primitives behind the envelope formats.
//!
//! AES-256-CBC with PKCS#7 padding is what earlier app versions wrote and
//! has no integrity check. AES-256-GCM is authenticated and is what new
//! envelopes use by default.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{CryptoError, Result};
use crate::key::DeviceKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// 128-bit CBC initialization vector.
pub const CBC_IV_LEN: usize = 16;

/// 96-bit GCM nonce.
pub const GCM_NONCE_LEN: usize = 12;

/// GCM authentication tag appended to the ciphertext.
pub const GCM_TAG_LEN: usize = 16;

/// Encrypt with AES-256-CBC and PKCS#7 padding.
pub fn cbc_encrypt(key: &DeviceKey, iv: &[u8; CBC_IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC and strip PKCS#7 padding.
pub fn cbc_decrypt(key: &DeviceKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher =
        Aes256CbcDec::new_from_slices(key.as_bytes(), iv).map_err(|_| CryptoError::Decryption)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypt with AES-256-GCM. The tag is appended to the returned bytes.
pub fn gcm_encrypt(
    key: &DeviceKey,
    nonce: &[u8; GCM_NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Decrypt and authenticate AES-256-GCM.
pub fn gcm_decrypt(key: &DeviceKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != GCM_NONCE_LEN {
        return Err(CryptoError::Decryption);
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Decryption)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}
