//! Device key store.
//!
//! Guarantees exactly one stable device key per storage identifier. The key
//! is created lazily on first use and read back from secure storage on every
//! later call; nothing here caches it.
//!
//! Creation is single-flight within the process: every `KeyStore` for the
//! same key id takes one process-wide async lock, however many sessions
//! built their own store. The write itself goes through
//! [`SecureStorage::insert_if_absent`], so a backend shared between
//! processes still ends up with one key. Whoever wrote first wins and every
//! caller returns that key.

use std::sync::Arc;

use safereport_core::{DeviceKey, EntropySource, OsEntropy};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::locks;
use crate::traits::{AccessPolicy, SecureStorage};

/// Storage identifier of the current key format.
pub const DEFAULT_KEY_ID: &str = "sr_key_v1";

/// Obtains or creates the device key.
pub struct KeyStore<S: SecureStorage> {
    storage: Arc<S>,
    key_id: String,
    policy: AccessPolicy,
    entropy: Arc<dyn EntropySource>,
    create_lock: Arc<Mutex<()>>,
}

impl<S: SecureStorage> KeyStore<S> {
    /// Key store over `storage` using [`DEFAULT_KEY_ID`].
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_key_id(storage, DEFAULT_KEY_ID)
    }

    /// Key store over `storage` using a custom identifier.
    pub fn with_key_id(storage: Arc<S>, key_id: impl Into<String>) -> Self {
        let key_id = key_id.into();
        Self {
            storage,
            create_lock: locks::named(&format!("keystore:{}", key_id)),
            key_id,
            policy: AccessPolicy::WhenUnlockedThisDeviceOnly,
            entropy: Arc::new(OsEntropy),
        }
    }

    /// Replace the random source used for key generation.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// The storage identifier.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Return the device key, creating and persisting it on first use.
    ///
    /// Never substitutes a key when storage fails, and never overwrites a
    /// stored value that fails to parse.
    pub async fn get_or_create_key(&self) -> Result<DeviceKey> {
        Ok(self.load_or_create().await?.1)
    }

    /// Return the device key as the hex string held in storage.
    ///
    /// A key created here is lowercase. A key written by something else is
    /// returned exactly as stored, once it parses.
    pub async fn get_or_create_key_hex(&self) -> Result<String> {
        Ok(self.load_or_create().await?.0)
    }

    async fn load_or_create(&self) -> Result<(String, DeviceKey)> {
        if let Some(stored) = self.storage.get(&self.key_id).await? {
            let key = self.parse(&stored)?;
            debug!(key_id = %self.key_id, fingerprint = %key.fingerprint(), "device key loaded");
            return Ok((stored, key));
        }

        let _guard = self.create_lock.lock().await;

        // Another caller may have created it while we waited for the lock.
        if let Some(stored) = self.storage.get(&self.key_id).await? {
            let key = self.parse(&stored)?;
            return Ok((stored, key));
        }

        let candidate = DeviceKey::generate(self.entropy.as_ref())?;
        let stored = self
            .storage
            .insert_if_absent(&self.key_id, &candidate.to_hex(), self.policy)
            .await?;
        let key = self.parse(&stored)?;

        if key == candidate {
            info!(key_id = %self.key_id, fingerprint = %key.fingerprint(), "device key created");
        } else {
            debug!(key_id = %self.key_id, "device key created concurrently elsewhere");
        }
        Ok((stored, key))
    }

    /// Whether a key has been stored yet.
    pub async fn key_exists(&self) -> Result<bool> {
        Ok(self.storage.get(&self.key_id).await?.is_some())
    }

    /// Remove the stored key. Data sealed under it becomes unreadable.
    pub async fn delete_key(&self) -> Result<bool> {
        let _guard = self.create_lock.lock().await;
        let removed = self.storage.delete(&self.key_id).await?;
        if removed {
            warn!(key_id = %self.key_id, "device key deleted");
        }
        Ok(removed)
    }

    fn parse(&self, stored: &str) -> Result<DeviceKey> {
        DeviceKey::from_hex(stored).map_err(|_| StoreError::CorruptKey {
            id: self.key_id.clone(),
        })
    }
}

impl<S: SecureStorage> std::fmt::Debug for KeyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("key_id", &self.key_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
