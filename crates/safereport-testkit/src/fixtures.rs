//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use safereport::{CryptoSession, KdfParams, PassphraseConfig, SessionConfig};
use safereport_core::{CryptoError, EntropySource};
use safereport_store::{AccessPolicy, MemoryStorage, SecureStorage, StoreError};
use serde::{Deserialize, Serialize};

/// A test fixture with in-memory key storage, an in-memory report cache,
/// and a session over both.
pub struct TestFixture {
    pub storage: Arc<MemoryStorage>,
    pub records: Arc<MemoryStorage>,
    pub session: CryptoSession<MemoryStorage, MemoryStorage>,
}

impl TestFixture {
    /// Fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Fixture with a passphrase configured at test-grade KDF cost.
    pub fn with_passphrase(passphrase: &str) -> Self {
        Self::with_config(SessionConfig::default().with_passphrase(
            PassphraseConfig::new(passphrase).with_kdf(KdfParams::insecure_for_tests()),
        ))
    }

    /// Fixture with an explicit configuration.
    ///
    /// Panics if the configuration is rejected.
    pub fn with_config(config: SessionConfig) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let records = Arc::new(MemoryStorage::new());
        let session = CryptoSession::with_storage(storage.clone(), config)
            .expect("fixture configuration must be valid")
            .with_record_cache(records.clone());
        Self {
            storage,
            records,
            session,
        }
    }

    /// A second session sharing this fixture's storage, as after an app restart.
    pub fn reopen(&self) -> CryptoSession<MemoryStorage, MemoryStorage> {
        CryptoSession::with_storage(self.storage.clone(), self.session.config().clone())
            .expect("fixture configuration must be valid")
            .with_record_cache(self.records.clone())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An incident report as submitted from the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub reporter_name: String,
    pub incident_date: String,
    pub location: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: String,
}

impl IncidentReport {
    /// A filled-in report.
    pub fn sample() -> Self {
        Self {
            reporter_name: "Jordan Lee".into(),
            incident_date: "2024-05-14".into(),
            location: "Main St".into(),
            description: "Unlit crossing near the bus depot".into(),
            image: Some("file:///reports/photo-0001.jpg".into()),
            created_at: "2024-05-14T18:22:05.000Z".into(),
        }
    }

    /// A report with the given location and no attachment.
    pub fn at(location: &str) -> Self {
        Self {
            location: location.into(),
            image: None,
            ..Self::sample()
        }
    }
}

/// Replays a fixed byte sequence, then fails.
///
/// Bytes are handed out in order across calls, so a seal that draws a salt
/// and then a nonce sees consecutive slices.
#[derive(Debug)]
pub struct ScriptedEntropy {
    bytes: Vec<u8>,
    offset: Mutex<usize>,
}

impl ScriptedEntropy {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            offset: Mutex::new(0),
        }
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        let offset = self.offset.lock().map(|o| *o).unwrap_or(self.bytes.len());
        self.bytes.len() - offset
    }
}

impl EntropySource for ScriptedEntropy {
    fn fill(&self, buf: &mut [u8]) -> safereport_core::Result<()> {
        let mut offset = self
            .offset
            .lock()
            .map_err(|_| CryptoError::Entropy("script poisoned".into()))?;
        let end = *offset + buf.len();
        if end > self.bytes.len() {
            return Err(CryptoError::Entropy("script exhausted".into()));
        }
        buf.copy_from_slice(&self.bytes[*offset..end]);
        *offset = end;
        Ok(())
    }
}

/// An entropy source that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill(&self, _buf: &mut [u8]) -> safereport_core::Result<()> {
        Err(CryptoError::Entropy("random source unavailable".into()))
    }
}

/// Storage that refuses every call, like a keychain before first unlock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockedStorage;

#[async_trait]
impl SecureStorage for LockedStorage {
    async fn get(&self, _id: &str) -> safereport_store::Result<Option<String>> {
        Err(StoreError::AccessDenied("device locked".into()))
    }

    async fn set(
        &self,
        _id: &str,
        _value: &str,
        _policy: AccessPolicy,
    ) -> safereport_store::Result<()> {
        Err(StoreError::AccessDenied("device locked".into()))
    }

    async fn delete(&self, _id: &str) -> safereport_store::Result<bool> {
        Err(StoreError::AccessDenied("device locked".into()))
    }

    async fn insert_if_absent(
        &self,
        _id: &str,
        _value: &str,
        _policy: AccessPolicy,
    ) -> safereport_store::Result<String> {
        Err(StoreError::AccessDenied("device locked".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safereport::SessionError;

    #[tokio::test]
    async fn test_fixture_reopen_sees_same_key() {
        let fixture = TestFixture::new();
        let key = fixture.session.device_key_hex().await.unwrap();
        assert_eq!(fixture.reopen().device_key_hex().await.unwrap(), key);
    }

    #[test]
    fn test_report_wire_names() {
        let json = serde_json::to_value(IncidentReport::sample()).unwrap();
        assert!(json.get("reporterName").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(serde_json::to_value(IncidentReport::at("Dock 4"))
            .unwrap()
            .get("image")
            .is_none());
    }

    #[test]
    fn test_scripted_entropy_in_order() {
        let source = ScriptedEntropy::new(vec![1, 2, 3, 4, 5]);
        let mut a = [0u8; 2];
        let mut b = [0u8; 3];
        source.fill(&mut a).unwrap();
        source.fill(&mut b).unwrap();
        assert_eq!(a, [1, 2]);
        assert_eq!(b, [3, 4, 5]);
        assert_eq!(source.remaining(), 0);
        assert!(source.fill(&mut [0u8; 1]).is_err());
    }

    #[tokio::test]
    async fn test_fixture_reopen_sees_cached_reports() {
        let fixture = TestFixture::new();
        fixture
            .session
            .cache_report("r1", &IncidentReport::sample())
            .await
            .unwrap();

        let reopened = fixture.reopen();
        let back: IncidentReport = reopened.load_report("r1").await.unwrap();
        assert_eq!(back, IncidentReport::sample());
        assert!(fixture.storage.get("sr_key_v1").await.unwrap().is_some());
        assert!(fixture.records.get("sr_key_v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locked_storage_surfaces_access_denied() {
        let session = CryptoSession::new(LockedStorage, SessionConfig::default()).unwrap();
        assert!(matches!(
            session.seal(&IncidentReport::sample()).await,
            Err(SessionError::Store(StoreError::AccessDenied(_)))
        ));
    }

    #[tokio::test]
    async fn test_failing_entropy_creates_no_key() {
        let fixture = TestFixture::new();
        let session = fixture.reopen().with_entropy(Arc::new(FailingEntropy));

        let err = session.device_key().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Store(StoreError::Crypto(CryptoError::Entropy(_)))
        ));
        assert!(!fixture.session.has_device_key().await.unwrap());
    }
}
