//! Storage traits: the abstract interfaces for secrets and sealed records.
//!
//! [`SecureStorage`] is the keychain-like collaborator the key store needs.
//! [`RecordStore`] caches sealed envelopes locally.

use async_trait::async_trait;
use safereport_core::Envelope;

use crate::error::Result;

/// When a stored secret may be read.
///
/// Mirrors the keychain accessibility classes of mobile platforms.
/// Backends that cannot enforce a class still record it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessPolicy {
    /// Readable while the device is unlocked; never migrated to another device.
    #[default]
    WhenUnlockedThisDeviceOnly,
    /// Readable while the device is unlocked; may be restored to a new device.
    WhenUnlocked,
    /// Readable after the first unlock since boot; never migrated.
    AfterFirstUnlockThisDeviceOnly,
    /// Readable after the first unlock since boot; may be migrated.
    AfterFirstUnlock,
}

impl AccessPolicy {
    /// Convert to the integer stored in SQLite.
    pub const fn to_u8(self) -> u8 {
        match self {
            AccessPolicy::WhenUnlockedThisDeviceOnly => 0,
            AccessPolicy::WhenUnlocked => 1,
            AccessPolicy::AfterFirstUnlockThisDeviceOnly => 2,
            AccessPolicy::AfterFirstUnlock => 3,
        }
    }

    /// Parse from the stored integer.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(AccessPolicy::WhenUnlockedThisDeviceOnly),
            1 => Some(AccessPolicy::WhenUnlocked),
            2 => Some(AccessPolicy::AfterFirstUnlockThisDeviceOnly),
            3 => Some(AccessPolicy::AfterFirstUnlock),
            _ => None,
        }
    }

    /// Whether the item is pinned to this device.
    pub const fn this_device_only(self) -> bool {
        matches!(
            self,
            AccessPolicy::WhenUnlockedThisDeviceOnly | AccessPolicy::AfterFirstUnlockThisDeviceOnly
        )
    }
}

/// Key-value secret storage with per-entry access policy.
///
/// All methods are async so blocking backends (SQLite, OS keychain) can run
/// on the blocking pool.
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Read the value stored under `id`.
    async fn get(&self, id: &str) -> Result<Option<String>>;

    /// Write `value` under `id`, replacing any existing value.
    async fn set(&self, id: &str, value: &str, policy: AccessPolicy) -> Result<()>;

    /// Remove `id`. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Write `value` only if `id` is empty, then return whatever is stored.
    ///
    /// Two calls racing on the same `id` must both return the same value,
    /// including calls made through different handles to the same backend.
    async fn insert_if_absent(
        &self,
        id: &str,
        value: &str,
        policy: AccessPolicy,
    ) -> Result<String>;
}

/// A sealed payload cached under a record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    /// Caller-chosen identifier.
    pub record_id: String,
    /// The encrypted payload.
    pub envelope: Envelope,
    /// When the record was written (Unix ms).
    pub created_at: i64,
}

/// Local cache of sealed envelopes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store an envelope under `record_id`, replacing any previous one.
    async fn put_record(&self, record_id: &str, envelope: &Envelope) -> Result<()>;

    /// Load the record stored under `record_id`.
    async fn get_record(&self, record_id: &str) -> Result<Option<SealedRecord>>;

    /// Remove a record. Returns whether anything was removed.
    async fn delete_record(&self, record_id: &str) -> Result<bool>;

    /// List record ids, oldest first.
    async fn list_records(&self) -> Result<Vec<String>>;
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
