//! Fingerprint ledger
//!
//! Detects (data, config) pairs that have already been processed. The
//! fingerprint is SHA-256 over `data || config`; the ledger is the set of
//! fingerprints seen so far, persisted in a SQLite file shared by every
//! worker of a run.
//!
//! Check and record happen in one `INSERT OR IGNORE` against the digest
//! primary key, so two workers presenting the same input can never both
//! see it as new. SQLite's write lock on the ledger file is the only lock;
//! contention is bounded by the busy timeout plus [`retry_on_lock`].
//!
//! Records are never deleted or truncated.

use crate::error::{LedgerAccessError, StageResult};
use crate::utils::retry_on_lock;
use prep_common::config::LedgerConfig;
use prep_common::db::{open_database, SqliteSettings};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::fmt;
use std::path::{Path, PathBuf};

/// Ledger file name inside the directory passed to [`FingerprintLedger::open`]
pub const LEDGER_FILE_NAME: &str = ".prep_fingerprints.db";

/// Digest size in bytes
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of one (data, config) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; DIGEST_LEN]);

impl Fingerprint {
    /// Digest `data` followed by `config`
    ///
    /// Both inputs must be serialized deterministically by the caller;
    /// swapping them gives a different fingerprint.
    pub fn compute(data: &[u8], config: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.update(config);

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; DIGEST_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Lowercase hex
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Lock settings for a ledger handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOptions {
    pub busy_timeout_ms: u64,
    pub max_lock_wait_ms: u64,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for LedgerOptions {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            busy_timeout_ms: config.busy_timeout_ms,
            max_lock_wait_ms: config.max_lock_wait_ms,
        }
    }
}

/// Handle on a persisted fingerprint ledger
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FingerprintLedger {
    db: SqlitePool,
    path: PathBuf,
    max_lock_wait_ms: u64,
}

impl FingerprintLedger {
    /// Open (creating if needed) the ledger in `dir`
    pub async fn open(dir: &Path, options: LedgerOptions) -> StageResult<Self> {
        Self::open_at(&dir.join(LEDGER_FILE_NAME), options).await
    }

    /// Open (creating if needed) the ledger at an explicit file path
    ///
    /// Existing records are kept and checked; a malformed record fails the
    /// open with [`LedgerAccessError::CorruptRecord`].
    pub async fn open_at(path: &Path, options: LedgerOptions) -> StageResult<Self> {
        let settings = SqliteSettings {
            busy_timeout_ms: options.busy_timeout_ms,
            acquire_timeout_ms: options.max_lock_wait_ms,
            ..Default::default()
        };
        let db = open_database(path, &settings).await?;

        let ledger = Self {
            db,
            path: path.to_path_buf(),
            max_lock_wait_ms: options.max_lock_wait_ms,
        };
        ledger.create_table().await?;
        ledger.verify().await?;

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create_table(&self) -> Result<(), LedgerAccessError> {
        let db = &self.db;
        retry_on_lock("ledger create table", self.max_lock_wait_ms, || async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS fingerprints (
                    digest BLOB PRIMARY KEY NOT NULL,
                    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(db)
            .await?;
            Ok(())
        })
        .await
    }

    /// Check every stored record is a full-size digest
    pub async fn verify(&self) -> Result<(), LedgerAccessError> {
        let db = &self.db;
        let bad: Option<(i64, i64)> = retry_on_lock("ledger verify", self.max_lock_wait_ms, || async move {
            let row = sqlx::query_as::<_, (i64, i64)>(
                "SELECT rowid, length(digest) FROM fingerprints WHERE typeof(digest) != 'blob' OR length(digest) != ? LIMIT 1",
            )
            .bind(DIGEST_LEN as i64)
            .fetch_optional(db)
            .await?;
            Ok(row)
        })
        .await?;

        match bad {
            Some((rowid, len)) => {
                tracing::error!(
                    ledger = %self.path.display(),
                    rowid,
                    len,
                    "Corrupt fingerprint ledger record"
                );
                Err(LedgerAccessError::CorruptRecord {
                    rowid,
                    len: len.max(0) as usize,
                })
            }
            None => Ok(()),
        }
    }

    /// Has this (data, config) pair been seen before?
    ///
    /// Returns `true` without touching the ledger if the fingerprint is
    /// already recorded; otherwise records it and returns `false`.
    pub async fn seen_before(&self, data: &[u8], config: &[u8]) -> StageResult<bool> {
        let fingerprint = Fingerprint::compute(data, config);
        let newly_recorded = self.record(&fingerprint).await?;
        Ok(!newly_recorded)
    }

    /// [`seen_before`](Self::seen_before) with the config serialized as compact JSON
    pub async fn seen_before_with_config<C: Serialize>(&self, data: &[u8], config: &C) -> StageResult<bool> {
        let config_bytes = serde_json::to_vec(config)?;
        self.seen_before(data, &config_bytes).await
    }

    /// Append `fingerprint` if absent; returns whether it was newly recorded
    pub async fn record(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerAccessError> {
        let db = &self.db;
        let digest = fingerprint.as_bytes().as_slice();

        let rows = retry_on_lock("ledger record", self.max_lock_wait_ms, || async move {
            let result = sqlx::query("INSERT OR IGNORE INTO fingerprints (digest) VALUES (?)")
                .bind(digest)
                .execute(db)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            tracing::info!(fingerprint = %fingerprint, "Fingerprint already in ledger");
            Ok(false)
        } else {
            tracing::debug!(fingerprint = %fingerprint, "Recorded new fingerprint");
            Ok(true)
        }
    }

    /// Read-only membership check
    pub async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerAccessError> {
        let db = &self.db;
        let digest = fingerprint.as_bytes().as_slice();

        retry_on_lock("ledger lookup", self.max_lock_wait_ms, || async move {
            let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM fingerprints WHERE digest = ?")
                .bind(digest)
                .fetch_optional(db)
                .await?;
            Ok(found.is_some())
        })
        .await
    }

    /// Number of recorded fingerprints
    pub async fn len(&self) -> Result<u64, LedgerAccessError> {
        let db = &self.db;
        let count: i64 = retry_on_lock("ledger count", self.max_lock_wait_ms, || async move {
            let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fingerprints")
                .fetch_one(db)
                .await?;
            Ok(count)
        })
        .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn is_empty(&self) -> Result<bool, LedgerAccessError> {
        Ok(self.len().await? == 0)
    }

    /// All recorded fingerprints, oldest first
    pub async fn fingerprints(&self) -> Result<Vec<Fingerprint>, LedgerAccessError> {
        let db = &self.db;
        let rows: Vec<(i64, Vec<u8>)> = retry_on_lock("ledger list", self.max_lock_wait_ms, || async move {
            let rows = sqlx::query_as::<_, (i64, Vec<u8>)>("SELECT rowid, digest FROM fingerprints ORDER BY rowid")
                .fetch_all(db)
                .await?;
            Ok(rows)
        })
        .await?;

        rows.into_iter()
            .map(|(rowid, digest)| {
                Fingerprint::from_slice(&digest).ok_or(LedgerAccessError::CorruptRecord {
                    rowid,
                    len: digest.len(),
                })
            })
            .collect()
    }

    /// Close the pool, flushing the WAL
    pub async fn close(self) {
        self.db.close().await;
    }
}
