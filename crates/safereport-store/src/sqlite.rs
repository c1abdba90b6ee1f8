//! SQLite implementation of the storage traits.
//!
//! The sealed record cache. It also implements [`SecureStorage`], but those
//! values sit in plaintext rows guarded only by file permissions, so it
//! holds secrets for tooling and tests, not production device keys. Uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use safereport_core::{Envelope, EnvelopeAlgorithm};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{now_millis, AccessPolicy, RecordStore, SealedRecord, SecureStorage};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        // Other processes may hold the file; wait for their writes instead of failing.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Access policy recorded for `id`, if present.
    pub async fn policy(&self, id: &str) -> Result<Option<AccessPolicy>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let raw: Option<u8> = conn
                .query_row(
                    "SELECT policy FROM secure_items WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|v| {
                AccessPolicy::from_u8(v)
                    .ok_or_else(|| StoreError::InvalidData(format!("unknown access policy {}", v)))
            })
            .transpose()
        })
        .await
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(StoreError::join)?
    }
}

/// record_id, version, alg, iv_base64, ciphertext_base64, created_at
type RecordRow = (String, u16, String, String, String, i64);

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((
        row.get("record_id")?,
        row.get("version")?,
        row.get("alg")?,
        row.get("iv_base64")?,
        row.get("ciphertext_base64")?,
        row.get("created_at")?,
    ))
}

#[async_trait]
impl SecureStorage for SqliteStorage {
    async fn get(&self, id: &str) -> Result<Option<String>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM secure_items WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set(&self, id: &str, value: &str, policy: AccessPolicy) -> Result<()> {
        let id = id.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            let now = now_millis();
            conn.execute(
                "INSERT INTO secure_items (id, value, policy, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    value = excluded.value,
                    policy = excluded.policy,
                    updated_at = excluded.updated_at",
                params![id, value, policy.to_u8(), now],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM secure_items WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn insert_if_absent(
        &self,
        id: &str,
        value: &str,
        policy: AccessPolicy,
    ) -> Result<String> {
        let id = id.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();
            tx.execute(
                "INSERT OR IGNORE INTO secure_items (id, value, policy, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, value, policy.to_u8(), now],
            )?;
            let stored: String = tx.query_row(
                "SELECT value FROM secure_items WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(stored)
        })
        .await
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    async fn put_record(&self, record_id: &str, envelope: &Envelope) -> Result<()> {
        let record_id = record_id.to_string();
        let envelope = envelope.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sealed_records
                    (record_id, version, alg, iv_base64, ciphertext_base64, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record_id,
                    envelope.version,
                    envelope.alg.as_str(),
                    envelope.iv_base64,
                    envelope.ciphertext_base64,
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<SealedRecord>> {
        let record_id = record_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT record_id, version, alg, iv_base64, ciphertext_base64, created_at
                     FROM sealed_records WHERE record_id = ?1",
                    params![record_id],
                    row_to_record,
                )
                .optional()?;

            let Some((record_id, version, alg, iv_base64, ciphertext_base64, created_at)) = row
            else {
                return Ok(None);
            };

            let alg: EnvelopeAlgorithm = alg
                .parse()
                .map_err(|_| StoreError::InvalidData(format!("unknown algorithm {}", alg)))?;

            Ok(Some(SealedRecord {
                record_id,
                envelope: Envelope {
                    version,
                    alg,
                    iv_base64,
                    ciphertext_base64,
                },
                created_at,
            }))
        })
        .await
    }

    async fn delete_record(&self, record_id: &str) -> Result<bool> {
        let record_id = record_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM sealed_records WHERE record_id = ?1",
                params![record_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT record_id FROM sealed_records ORDER BY created_at ASC, record_id ASC",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
    }
}
