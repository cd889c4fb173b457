//! Error types for prep-stage
//!
//! Failures are scoped to one recording: a `RecordingError` names the
//! recording and data type so a batch log points at the input that broke.
//! Whether one failure stops the whole batch is the caller's
//! `exit_on_error` policy, see [`apply_exit_policy`].

use crate::identity::{DataType, RecordingIdentity};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for staging operations not tied to a recording
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Staging failure
#[derive(Debug, Error)]
pub enum StageError {
    /// A directory in the artifact chain could not be created
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object or parameter tree could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Fingerprint ledger could not be consulted
    #[error("Ledger access failed: {0}")]
    LedgerAccess(#[from] LedgerAccessError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// prep-common error
    #[error("Common error: {0}")]
    Common(#[from] prep_common::Error),
}

impl StageError {
    /// Attach the recording this failure belongs to
    pub fn for_recording(self, identity: &RecordingIdentity, datatype: &DataType) -> RecordingError {
        RecordingError {
            recording: identity.clone(),
            datatype: datatype.clone(),
            source: self,
        }
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::Serialization(err.to_string())
    }
}

/// Ledger failure
///
/// Never mapped to "not seen": a ledger we can't read must not make an
/// already-processed input look new.
#[derive(Debug, Error)]
pub enum LedgerAccessError {
    /// Another worker held the ledger lock past the wait budget
    #[error("ledger locked after {attempts} attempts ({elapsed_ms} ms elapsed, max {max_wait_ms} ms)")]
    LockTimeout {
        attempts: u32,
        elapsed_ms: u64,
        max_wait_ms: u64,
    },

    /// Stored digest is not a 32-byte SHA-256 value
    #[error("corrupt ledger record {rowid}: expected 32-byte digest, found {len} bytes")]
    CorruptRecord { rowid: i64, len: usize },

    /// Any other database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Staging failure attributed to one recording
#[derive(Debug, Error)]
#[error("{recording} ({datatype}): {source}")]
pub struct RecordingError {
    pub recording: RecordingIdentity,
    pub datatype: DataType,
    #[source]
    pub source: StageError,
}

/// Result type for per-recording operations
pub type RecordingResult<T> = std::result::Result<T, RecordingError>;

/// Apply the batch `exit_on_error` policy to one recording's result
///
/// - `Ok(v)` → `Ok(Some(v))`
/// - `Err(e)` with `exit_on_error` → `Err(e)`, the caller stops the batch
/// - `Err(e)` without it → logged, `Ok(None)`, the batch moves on
pub fn apply_exit_policy<T>(result: RecordingResult<T>, exit_on_error: bool) -> RecordingResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if exit_on_error => Err(err),
        Err(err) => {
            tracing::error!(
                recording = %err.recording,
                datatype = %err.datatype,
                error = %err.source,
                "Recording failed, skipping"
            );
            Ok(None)
        }
    }
}
