//! End-to-end session behaviour over file-backed storage.

use std::sync::Arc;

use anyhow::Result;
use safereport::core::{decrypt, Envelope};
use safereport::store::{RecordStore, SecureStorage};
use safereport::{
    CryptoSession, EnvelopeAlgorithm, KdfParams, MemoryStorage, PassphraseConfig, SessionConfig,
    SessionError, SqliteStorage,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    reporter_name: String,
    incident_date: String,
    location: String,
    description: String,
}

fn report() -> Report {
    Report {
        reporter_name: "A. Guard".into(),
        incident_date: "2024-03-02".into(),
        location: "Main St".into(),
        description: "Loose railing on the north stairwell".into(),
    }
}

#[tokio::test]
async fn sealed_report_readable_after_restart() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("device.db");

    let wire = {
        let session = CryptoSession::new(SqliteStorage::open(&path)?, SessionConfig::default())?;
        session.seal_json(&report()).await?
    };

    let session = CryptoSession::new(SqliteStorage::open(&path)?, SessionConfig::default())?;
    let back: Report = session.open_json(&wire).await?;
    assert_eq!(back, report());
    Ok(())
}

#[tokio::test]
async fn envelope_opens_with_plain_hex_api() -> Result<()> {
    let session = CryptoSession::new(SqliteStorage::open_memory()?, SessionConfig::default())?;

    let payload = json!({"type": "safety_report", "location": "Main St"});
    let envelope = session.seal(&payload).await?;
    let key_hex = session.device_key_hex().await?;

    assert_eq!(key_hex.len(), 64);
    assert!(key_hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(decrypt(&envelope, &key_hex)?, payload);
    Ok(())
}

#[tokio::test]
async fn legacy_cbc_envelope_still_opens() -> Result<()> {
    let storage = Arc::new(SqliteStorage::open_memory()?);
    let cbc = CryptoSession::with_storage(
        storage.clone(),
        SessionConfig::default().with_algorithm(EnvelopeAlgorithm::Aes256Cbc),
    )?;
    let envelope = cbc.seal(&report()).await?;

    // Older app builds wrote only the two base64 fields.
    let legacy = format!(
        r#"{{"ivBase64":"{}","ciphertextBase64":"{}"}}"#,
        envelope.iv_base64, envelope.ciphertext_base64
    );
    assert!(Envelope::from_json(&legacy)?.is_legacy());

    let gcm = CryptoSession::with_storage(storage, SessionConfig::default())?;
    let back: Report = gcm.open_json(&legacy).await?;
    assert_eq!(back, report());
    Ok(())
}

#[tokio::test]
async fn other_device_cannot_open() -> Result<()> {
    init_tracing();
    let a = CryptoSession::new(SqliteStorage::open_memory()?, SessionConfig::default())?;
    let b = CryptoSession::new(SqliteStorage::open_memory()?, SessionConfig::default())?;

    let envelope = a.seal(&report()).await?;
    let err = b.open::<Value>(&envelope).await.unwrap_err();
    assert!(err.is_decryption_failure());
    Ok(())
}

#[tokio::test]
async fn report_cache_survives_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("cache.db");
    // Stands in for the platform keychain, which outlives the app process.
    let keychain = Arc::new(MemoryStorage::new());

    {
        let session = CryptoSession::with_storage(keychain.clone(), SessionConfig::default())?
            .with_record_cache(Arc::new(SqliteStorage::open(&path)?));
        session.cache_report("report-1", &report()).await?;
        session.cache_report("report-2", &json!({"draft": true})).await?;
    }

    let session = CryptoSession::with_storage(keychain, SessionConfig::default())?
        .with_record_cache(Arc::new(SqliteStorage::open(&path)?));
    assert_eq!(session.cached_reports().await?.len(), 2);

    let first: Report = session.load_report("report-1").await?;
    assert_eq!(first, report());
    Ok(())
}

#[tokio::test]
async fn device_key_never_written_to_record_database() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("records.db");
    let keychain = Arc::new(MemoryStorage::new());
    let records = Arc::new(SqliteStorage::open(&path)?);

    let session = CryptoSession::with_storage(keychain.clone(), SessionConfig::default())?
        .with_record_cache(records.clone());
    session.cache_report("report-1", &report()).await?;

    let key_hex = session.device_key_hex().await?;
    assert_eq!(keychain.get("sr_key_v1").await?, Some(key_hex.clone()));
    assert!(records.get("sr_key_v1").await?.is_none());
    assert_eq!(records.list_records().await?, vec!["report-1".to_string()]);

    let raw = std::fs::read(&path)?;
    assert!(!raw.windows(key_hex.len()).any(|w| w == key_hex.as_bytes()));
    Ok(())
}

#[tokio::test]
async fn passphrase_blob_independent_of_device_key() -> Result<()> {
    let config = SessionConfig::default().with_passphrase(
        PassphraseConfig::new("deploy-time secret").with_kdf(KdfParams::insecure_for_tests()),
    );

    let a = CryptoSession::new(SqliteStorage::open_memory()?, config.clone())?;
    let b = CryptoSession::new(SqliteStorage::open_memory()?, config)?;

    let blob = a.protect_local(&report())?;
    assert!(blob.starts_with("srp1$argon2id$"));

    let back: Report = b.unprotect_local(&blob)?;
    assert_eq!(back, report());

    // Neither session touched its key store.
    assert!(!a.has_device_key().await?);
    assert!(b.key_storage().get("sr_key_v1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn wrong_passphrase_is_opaque_failure() -> Result<()> {
    let seal = CryptoSession::new(
        SqliteStorage::open_memory()?,
        SessionConfig::default().with_passphrase(
            PassphraseConfig::new("one").with_kdf(KdfParams::insecure_for_tests()),
        ),
    )?;
    let open = CryptoSession::new(
        SqliteStorage::open_memory()?,
        SessionConfig::default().with_passphrase(
            PassphraseConfig::new("two").with_kdf(KdfParams::insecure_for_tests()),
        ),
    )?;

    let blob = seal.protect_local(&json!([1, 2, 3]))?;
    let err = open.unprotect_local::<Value>(&blob).unwrap_err();
    assert!(matches!(err, SessionError::Crypto(_)));
    assert!(err.is_decryption_failure());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_passphrase_sealing_off_the_runtime() -> Result<()> {
    let session = CryptoSession::new(
        MemoryStorage::new(),
        SessionConfig::default().with_passphrase(
            PassphraseConfig::new("deploy-time secret").with_kdf(KdfParams::insecure_for_tests()),
        ),
    )?;

    let blob = session.protect_local_async(report()).await?;
    let back: Report = session.unprotect_local_async(&blob).await?;
    assert_eq!(back, report());
    assert_eq!(session.unprotect_local::<Report>(&blob)?, report());
    Ok(())
}
