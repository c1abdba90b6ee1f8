//! OS keychain backend.
//!
//! Stores each secret as a keychain entry under a fixed service name, with
//! the storage id as the account. The platform decides how access is
//! guarded; the requested [`AccessPolicy`] is logged but cannot be enforced
//! through the portable keyring API.
//!
//! The keychain has no compare-and-set, so [`KeyringStorage::insert_if_absent`]
//! serializes on a process-wide lock per (service, id).

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::locks;
use crate::traits::{AccessPolicy, SecureStorage};

/// Default keychain service name.
pub const DEFAULT_SERVICE: &str = "safereport";

/// Secure storage backed by the platform keychain.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    /// Use the default service name.
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    /// Use a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// The keychain service name entries are filed under.
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<F, T>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(Entry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &id).map_err(map_keyring_error)?;
            f(entry)
        })
        .await
        .map_err(StoreError::join)?
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(e: keyring::Error) -> StoreError {
    match e {
        keyring::Error::NoStorageAccess(inner) => StoreError::AccessDenied(inner.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl SecureStorage for KeyringStorage {
    async fn get(&self, id: &str) -> Result<Option<String>> {
        self.with_entry(id, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_keyring_error(e)),
        })
        .await
    }

    async fn set(&self, id: &str, value: &str, policy: AccessPolicy) -> Result<()> {
        debug!(service = %self.service, id, ?policy, "writing keychain entry");
        let value = value.to_string();
        self.with_entry(id, move |entry| {
            entry.set_password(&value).map_err(map_keyring_error)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.with_entry(id, |entry| match entry.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(map_keyring_error(e)),
        })
        .await
    }

    async fn insert_if_absent(
        &self,
        id: &str,
        value: &str,
        policy: AccessPolicy,
    ) -> Result<String> {
        let lock = locks::named(&format!("keyring:{}:{}", self.service, id));
        let _guard = lock.lock().await;

        if let Some(existing) = self.get(id).await? {
            return Ok(existing);
        }
        self.set(id, value, policy).await?;
        self.get(id).await?.ok_or_else(|| {
            StoreError::Unavailable(format!("{} missing from keychain after write", id))
        })
    }
}
