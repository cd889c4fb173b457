//! prep-stage library interface
//!
//! Staging layer of the EEG preprocessing pipeline: decides where each
//! processed object lands in the derivative hierarchy, whether a recording
//! is already done, and whether a (data, config) pair was already run.
//!
//! - [`layout`]: path and file-name derivation
//! - [`fs`]: directory materialization
//! - [`completion`]: skip check for finished recordings
//! - [`ledger`]: content-fingerprint dedup ledger
//! - [`writer`]: artifact and report persistence
//! - [`defaults`]: default parameter tree

pub mod completion;
pub mod defaults;
pub mod error;
pub mod fs;
pub mod identity;
pub mod layout;
pub mod ledger;
pub mod utils;
pub mod writer;

pub use crate::completion::is_complete;
pub use crate::defaults::{build_defaults, ConfigTree, DefaultsRequest, Selection};
pub use crate::error::{apply_exit_policy, LedgerAccessError, RecordingError, RecordingResult, StageError, StageResult};
pub use crate::identity::{DataType, RecordingIdentity, SignalKind, Stage};
pub use crate::layout::{ArtifactLocation, StagingLayout};
pub use crate::ledger::{Fingerprint, FingerprintLedger, LedgerOptions};
pub use crate::writer::{write_artifact, write_report, SignalData};
