//! The session: device key, envelopes, and passphrase sealing in one place.
//!
//! A [`CryptoSession`] is an explicit object owned by the application. It
//! holds no key material between calls; every seal or open asks the
//! [`KeyStore`] for the device key.
//!
//! The device key and the sealed report cache live in separate backends.
//! Keys go to secure storage (the platform keychain in production); the
//! cache is attached with [`CryptoSession::with_record_cache`] and only ever
//! sees envelopes.

use std::sync::Arc;

use safereport_core::{
    CryptoError, DeviceKey, EntropySource, Envelope, OsEntropy, PassphraseCodec,
};
use safereport_store::{KeyStore, RecordStore, SecureStorage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Record cache slot of a session built without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecordCache;

/// Crypto session over a key backend `K` and an optional report cache `R`.
pub struct CryptoSession<K: SecureStorage, R = NoRecordCache> {
    /// Device key lookup and creation.
    keystore: KeyStore<K>,
    /// Sealed report cache.
    records: Arc<R>,
    /// Configuration.
    config: SessionConfig,
    /// Passphrase codec, present when a passphrase is configured.
    passphrase: Option<PassphraseCodec>,
    /// Random source for IVs.
    entropy: Arc<dyn EntropySource>,
}

impl<K: SecureStorage> CryptoSession<K> {
    /// Create a session that owns its key storage.
    pub fn new(keys: K, config: SessionConfig) -> Result<Self> {
        Self::with_storage(Arc::new(keys), config)
    }

    /// Create a session over shared key storage.
    pub fn with_storage(keys: Arc<K>, config: SessionConfig) -> Result<Self> {
        let passphrase = match &config.passphrase {
            Some(p) => Some(PassphraseCodec::with_params(p.passphrase.as_str(), p.kdf)?),
            None => None,
        };

        Ok(Self {
            keystore: KeyStore::with_key_id(keys, config.key_id.clone()),
            records: Arc::new(NoRecordCache),
            config,
            passphrase,
            entropy: Arc::new(OsEntropy),
        })
    }
}

impl<K: SecureStorage, R> CryptoSession<K, R> {
    /// Attach a cache for sealed reports, replacing any previous one.
    ///
    /// The cache holds envelopes only; the device key stays in the key
    /// storage this session was built with.
    pub fn with_record_cache<C: RecordStore>(self, records: Arc<C>) -> CryptoSession<K, C> {
        CryptoSession {
            keystore: self.keystore,
            records,
            config: self.config,
            passphrase: self.passphrase,
            entropy: self.entropy,
        }
    }

    /// Replace the random source for keys, IVs, salts, and nonces.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.keystore = self.keystore.with_entropy(entropy.clone());
        self.passphrase = self.passphrase.map(|codec| codec.with_entropy(entropy.clone()));
        self.entropy = entropy;
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The key store.
    pub fn keystore(&self) -> &KeyStore<K> {
        &self.keystore
    }

    /// The backend holding the device key.
    pub fn key_storage(&self) -> &K {
        self.keystore.storage()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Device Key
    // ─────────────────────────────────────────────────────────────────────────

    /// Return the device key, creating it on first use.
    pub async fn device_key(&self) -> Result<DeviceKey> {
        Ok(self.keystore.get_or_create_key().await?)
    }

    /// Return the device key as the 64-character hex string held in storage.
    pub async fn device_key_hex(&self) -> Result<String> {
        Ok(self.keystore.get_or_create_key_hex().await?)
    }

    /// Whether the device key has been created.
    pub async fn has_device_key(&self) -> Result<bool> {
        Ok(self.keystore.key_exists().await?)
    }

    /// Delete the device key. Everything sealed under it becomes unreadable.
    pub async fn reset_device_key(&self) -> Result<bool> {
        Ok(self.keystore.delete_key().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Envelopes
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a value under the device key with the configured algorithm.
    pub async fn seal<T: Serialize + ?Sized + Sync>(&self, value: &T) -> Result<Envelope> {
        let key = self.device_key().await?;
        Ok(Envelope::seal_with(
            value,
            &key,
            self.config.algorithm,
            self.entropy.as_ref(),
        )?)
    }

    /// Open an envelope sealed under the device key.
    pub async fn open<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T> {
        let key = self.device_key().await?;
        envelope.open(&key).map_err(|e| {
            if matches!(e, CryptoError::Decryption) {
                warn!(alg = %envelope.alg, version = envelope.version, "envelope rejected");
            }
            SessionError::from(e)
        })
    }

    /// Seal a value and return the envelope's JSON wire form.
    pub async fn seal_json<T: Serialize + ?Sized + Sync>(&self, value: &T) -> Result<String> {
        Ok(self.seal(value).await?.to_json()?)
    }

    /// Parse an envelope from its JSON wire form and open it.
    pub async fn open_json<T: DeserializeOwned>(&self, wire: &str) -> Result<T> {
        let envelope = Envelope::from_json(wire).map_err(|e| {
            warn!("envelope wire form rejected");
            SessionError::from(e)
        })?;
        self.open(&envelope).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Passphrase Sealing
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a value under the configured passphrase.
    ///
    /// Independent of the device key. Runs Argon2id on the calling thread;
    /// async callers want [`protect_local_async`](Self::protect_local_async).
    pub fn protect_local<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(self.passphrase_codec()?.encrypt_data(value)?)
    }

    /// Open a string produced by [`protect_local`](Self::protect_local).
    pub fn unprotect_local<T: DeserializeOwned>(&self, ciphertext: &str) -> Result<T> {
        self.passphrase_codec()?
            .decrypt_data(ciphertext)
            .map_err(passphrase_failure)
    }

    /// [`protect_local`](Self::protect_local) on the blocking pool.
    pub async fn protect_local_async<T>(&self, value: T) -> Result<String>
    where
        T: Serialize + Send + 'static,
    {
        let codec = self.passphrase_codec()?.clone();
        let sealed = tokio::task::spawn_blocking(move || codec.encrypt_data(&value)).await??;
        Ok(sealed)
    }

    /// [`unprotect_local`](Self::unprotect_local) on the blocking pool.
    pub async fn unprotect_local_async<T>(&self, ciphertext: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let codec = self.passphrase_codec()?.clone();
        let ciphertext = ciphertext.to_string();
        tokio::task::spawn_blocking(move || codec.decrypt_data::<T>(&ciphertext))
            .await?
            .map_err(passphrase_failure)
    }

    fn passphrase_codec(&self) -> Result<&PassphraseCodec> {
        self.passphrase
            .as_ref()
            .ok_or(SessionError::NotConfigured("passphrase"))
    }
}

fn passphrase_failure(e: CryptoError) -> SessionError {
    if matches!(e, CryptoError::Decryption) {
        warn!("passphrase ciphertext rejected");
    }
    SessionError::from(e)
}

impl<K: SecureStorage, R: RecordStore> CryptoSession<K, R> {
    /// The sealed report cache.
    pub fn record_cache(&self) -> &R {
        &self.records
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sealed Record Cache
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a report and cache it under `record_id`, replacing any previous one.
    pub async fn cache_report<T: Serialize + ?Sized + Sync>(
        &self,
        record_id: &str,
        report: &T,
    ) -> Result<Envelope> {
        let envelope = self.seal(report).await?;
        self.records.put_record(record_id, &envelope).await?;
        debug!(record_id, alg = %envelope.alg, "report cached");
        Ok(envelope)
    }

    /// Load and open the report cached under `record_id`.
    pub async fn load_report<T: DeserializeOwned>(&self, record_id: &str) -> Result<T> {
        let record = self
            .records
            .get_record(record_id)
            .await?
            .ok_or_else(|| SessionError::RecordNotFound(record_id.to_string()))?;
        debug!(record_id, "report loaded");
        self.open(&record.envelope).await
    }

    /// Remove a cached report.
    pub async fn forget_report(&self, record_id: &str) -> Result<bool> {
        Ok(self.records.delete_record(record_id).await?)
    }

    /// Ids of cached reports, oldest first.
    pub async fn cached_reports(&self) -> Result<Vec<String>> {
        Ok(self.records.list_records().await?)
    }
}

impl<K: SecureStorage, R> std::fmt::Debug for CryptoSession<K, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSession")
            .field("keystore", &self.keystore)
            .field("config", &self.config)
            .field("passphrase", &self.passphrase.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PassphraseConfig;
    use safereport_core::{EnvelopeAlgorithm, KdfParams};
    use safereport_store::{MemoryStorage, StoreError};
    use serde_json::{json, Value};

    fn session(config: SessionConfig) -> CryptoSession<MemoryStorage> {
        CryptoSession::new(MemoryStorage::new(), config).unwrap()
    }

    fn with_passphrase() -> SessionConfig {
        SessionConfig::default().with_passphrase(
            PassphraseConfig::new("correct horse").with_kdf(KdfParams::insecure_for_tests()),
        )
    }

    #[tokio::test]
    async fn test_seal_open_uses_configured_algorithm() {
        for alg in [EnvelopeAlgorithm::Aes256Cbc, EnvelopeAlgorithm::Aes256Gcm] {
            let session = session(SessionConfig::default().with_algorithm(alg));
            let report = json!({"type": "safety_report", "location": "Main St"});

            let envelope = session.seal(&report).await.unwrap();
            assert_eq!(envelope.alg, alg);

            let opened: Value = session.open(&envelope).await.unwrap();
            assert_eq!(opened, report);
        }
    }

    #[tokio::test]
    async fn test_device_key_stable() {
        let session = session(SessionConfig::default());
        assert!(!session.has_device_key().await.unwrap());

        let a = session.device_key_hex().await.unwrap();
        let b = session.device_key_hex().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(session.has_device_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_makes_old_envelopes_unreadable() {
        let session = session(SessionConfig::default());
        let envelope = session.seal(&json!({"n": 1})).await.unwrap();

        assert!(session.reset_device_key().await.unwrap());

        let err = session.open::<Value>(&envelope).await.unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[tokio::test]
    async fn test_wire_form_roundtrip() {
        let session = session(SessionConfig::default());
        let wire = session.seal_json(&vec![1, 2, 3]).await.unwrap();
        assert!(wire.contains("ivBase64"));

        let back: Vec<i32> = session.open_json(&wire).await.unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        let err = session.open_json::<Value>("not json").await.unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[tokio::test]
    async fn test_custom_key_id() {
        let storage = Arc::new(MemoryStorage::new());
        let config = SessionConfig {
            key_id: "sr_key_v2".into(),
            ..SessionConfig::default()
        };
        let session = CryptoSession::with_storage(storage.clone(), config).unwrap();
        session.device_key().await.unwrap();

        assert!(storage.get("sr_key_v2").await.unwrap().is_some());
        assert!(storage.get("sr_key_v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_key_surfaces_as_store_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set("sr_key_v1", "zz", Default::default())
            .await
            .unwrap();
        let session = CryptoSession::with_storage(storage, SessionConfig::default()).unwrap();

        assert!(matches!(
            session.seal(&1).await,
            Err(SessionError::Store(StoreError::CorruptKey { .. }))
        ));
    }

    #[test]
    fn test_protect_local_roundtrip() {
        let session = session(with_passphrase());
        let value = json!({"nested": {"list": [1, true, null, "x"]}, "n": 2.5});

        let sealed = session.protect_local(&value).unwrap();
        let back: Value = session.unprotect_local(&sealed).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_protect_local_without_passphrase() {
        let session = session(SessionConfig::default());
        assert!(matches!(
            session.protect_local(&1),
            Err(SessionError::NotConfigured("passphrase"))
        ));
        assert!(matches!(
            session.unprotect_local::<Value>("srp1$..."),
            Err(SessionError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_empty_passphrase_rejected_at_construction() {
        let config = SessionConfig::default().with_passphrase(PassphraseConfig::new(""));
        let result = CryptoSession::new(MemoryStorage::new(), config);
        assert!(matches!(
            result,
            Err(SessionError::Crypto(CryptoError::InvalidKey(_)))
        ));
    }

    #[tokio::test]
    async fn test_report_cache() {
        let session = session(SessionConfig::default())
            .with_record_cache(Arc::new(MemoryStorage::new()));
        let report = json!({"type": "safety_report", "location": "Main St"});

        session.cache_report("r1", &report).await.unwrap();
        let loaded: Value = session.load_report("r1").await.unwrap();
        assert_eq!(loaded, report);
        assert_eq!(session.cached_reports().await.unwrap(), vec!["r1".to_string()]);

        assert!(session.forget_report("r1").await.unwrap());
        assert!(matches!(
            session.load_report::<Value>("r1").await,
            Err(SessionError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_key_and_records_kept_apart() {
        let keys = Arc::new(MemoryStorage::new());
        let records = Arc::new(MemoryStorage::new());
        let session = CryptoSession::with_storage(keys.clone(), SessionConfig::default())
            .unwrap()
            .with_record_cache(records.clone());

        session.cache_report("r1", &json!({"n": 1})).await.unwrap();

        assert!(keys.get("sr_key_v1").await.unwrap().is_some());
        assert!(keys.list_records().await.unwrap().is_empty());
        assert!(records.get("sr_key_v1").await.unwrap().is_none());
        assert_eq!(records.list_records().await.unwrap(), vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_async_passphrase_matches_sync() {
        let session = session(with_passphrase());
        let value = json!({"draft": true, "items": [1, 2]});

        let sealed = session.protect_local_async(value.clone()).await.unwrap();
        let back: Value = session.unprotect_local(&sealed).unwrap();
        assert_eq!(back, value);

        let sealed = session.protect_local(&value).unwrap();
        let back: Value = session.unprotect_local_async(&sealed).await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn test_async_passphrase_errors() {
        let session = session(with_passphrase());
        let err = session
            .unprotect_local_async::<Value>("srp1$argon2id$garbage")
            .await
            .unwrap_err();
        assert!(err.is_decryption_failure());

        let bare = self::session(SessionConfig::default());
        assert!(matches!(
            bare.protect_local_async(1).await,
            Err(SessionError::NotConfigured("passphrase"))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let session = session(with_passphrase());
        let debug = format!("{:?}", session);
        assert!(!debug.contains("correct horse"));
    }
}
