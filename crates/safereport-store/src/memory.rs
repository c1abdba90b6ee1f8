//! In-memory implementation of the storage traits.
//!
//! Same semantics as SQLite but nothing survives the process. Used by tests
//! and by sessions that must leave no trace on disk.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use safereport_core::Envelope;

use crate::error::{Result, StoreError};
use crate::traits::{now_millis, AccessPolicy, RecordStore, SealedRecord, SecureStorage};

/// In-memory store implementation.
///
/// Thread-safe via RwLock.
pub struct MemoryStorage {
    inner: RwLock<MemoryStorageInner>,
}

struct MemoryStorageInner {
    /// Secrets indexed by id.
    secrets: HashMap<String, StoredSecret>,

    /// Sealed records indexed by record id.
    records: HashMap<String, SealedRecord>,
}

struct StoredSecret {
    value: String,
    policy: AccessPolicy,
}

impl MemoryStorage {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStorageInner {
                secrets: HashMap::new(),
                records: HashMap::new(),
            }),
        }
    }

    /// Access policy recorded for `id`, if present.
    pub fn policy(&self, id: &str) -> Option<AccessPolicy> {
        self.read().ok()?.secrets.get(id).map(|s| s.policy)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStorageInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStorageInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn get(&self, id: &str) -> Result<Option<String>> {
        let inner = self.read()?;
        Ok(inner.secrets.get(id).map(|s| s.value.clone()))
    }

    async fn set(&self, id: &str, value: &str, policy: AccessPolicy) -> Result<()> {
        let mut inner = self.write()?;
        inner.secrets.insert(
            id.to_string(),
            StoredSecret {
                value: value.to_string(),
                policy,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.secrets.remove(id).is_some())
    }

    async fn insert_if_absent(
        &self,
        id: &str,
        value: &str,
        policy: AccessPolicy,
    ) -> Result<String> {
        let mut inner = self.write()?;
        let stored = inner
            .secrets
            .entry(id.to_string())
            .or_insert_with(|| StoredSecret {
                value: value.to_string(),
                policy,
            });
        Ok(stored.value.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStorage {
    async fn put_record(&self, record_id: &str, envelope: &Envelope) -> Result<()> {
        let mut inner = self.write()?;
        inner.records.insert(
            record_id.to_string(),
            SealedRecord {
                record_id: record_id.to_string(),
                envelope: envelope.clone(),
                created_at: now_millis(),
            },
        );
        Ok(())
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<SealedRecord>> {
        let inner = self.read()?;
        Ok(inner.records.get(record_id).cloned())
    }

    async fn delete_record(&self, record_id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.records.remove(record_id).is_some())
    }

    async fn list_records(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        let mut records: Vec<&SealedRecord> = inner.records.values().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(records.into_iter().map(|r| r.record_id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safereport_core::{DeviceKey, EnvelopeAlgorithm};

    #[tokio::test]
    async fn test_memory_storage_basic() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v1", AccessPolicy::WhenUnlocked).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(storage.policy("k"), Some(AccessPolicy::WhenUnlocked));

        assert!(storage.delete("k").await.unwrap());
        assert!(!storage.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first() {
        let storage = MemoryStorage::new();
        let first = storage
            .insert_if_absent("k", "first", AccessPolicy::default())
            .await
            .unwrap();
        let second = storage
            .insert_if_absent("k", "second", AccessPolicy::WhenUnlocked)
            .await
            .unwrap();

        assert_eq!(first, "first");
        assert_eq!(second, "first");
        assert_eq!(storage.policy("k"), Some(AccessPolicy::default()));
    }

    #[tokio::test]
    async fn test_records() {
        let storage = MemoryStorage::new();
        let key = DeviceKey::from_bytes([4; 32]);
        let envelope = Envelope::seal(&"payload", &key, EnvelopeAlgorithm::Aes256Gcm).unwrap();

        storage.put_record("r1", &envelope).await.unwrap();
        let record = storage.get_record("r1").await.unwrap().unwrap();
        assert_eq!(record.envelope, envelope);
        assert_eq!(storage.list_records().await.unwrap(), vec!["r1".to_string()]);

        assert!(storage.delete_record("r1").await.unwrap());
        assert!(storage.get_record("r1").await.unwrap().is_none());
    }
}
