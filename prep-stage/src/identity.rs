//! Recording identity, data type and processing stage

use serde::{Deserialize, Serialize};
use std::fmt;

/// One source recording (subject/session/task/run)
///
/// Fields are opaque identifiers supplied by whatever loaded the recording.
/// They are not validated here: an empty or odd field yields an odd but
/// deterministic path. Fields must not contain `_<entity>-` sequences
/// (`_ses-`, `_task-`, `_run-`, `_proc-`): two identities differing only in
/// where such a sequence falls resolve to the same file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordingIdentity {
    pub subject: String,
    pub session: String,
    pub task: String,
    pub run: String,
}

impl RecordingIdentity {
    pub fn new(
        subject: impl Into<String>,
        session: impl Into<String>,
        task: impl Into<String>,
        run: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
            task: task.into(),
            run: run.into(),
        }
    }

    /// `sub-<S>_ses-<E>_task-<T>_run-<R>`
    pub fn label(&self) -> String {
        format!(
            "sub-{}_ses-{}_task-{}_run-{}",
            self.subject, self.session, self.task, self.run
        )
    }
}

impl fmt::Display for RecordingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Acquisition data type (`eeg`, `meg`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn eeg() -> Self {
        Self::new("eeg")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where an artifact sits in the pipeline
///
/// Chosen by the stage that produced the object; never inferred from the
/// tag's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Output of a named processing step (e.g. `filter_data`)
    Intermediate(String),
    /// Terminal output of the pipeline
    Final,
}

impl Stage {
    pub fn intermediate(tag: impl Into<String>) -> Self {
        Self::Intermediate(tag.into())
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Stage::Final)
    }

    /// Subtree under `derivatives/<pipeline>/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Final => FINAL_DIR,
            Stage::Intermediate(_) => INTERMEDIATE_DIR,
        }
    }
}

/// Subtree for fully processed artifacts
pub const FINAL_DIR: &str = "final";

/// Subtree for per-step artifacts
pub const INTERMEDIATE_DIR: &str = "intermediate";

/// Shape of the signal object being staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Continuous recording
    Continuous,
    /// Segmented into epochs
    Epoched,
}

impl SignalKind {
    /// File extension, including the epoch marker for segmented data
    pub fn extension(&self) -> &'static str {
        match self {
            SignalKind::Continuous => ".fif",
            SignalKind::Epoched => "_epo.fif",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_follows_bids_entities() {
        let id = RecordingIdentity::new("01", "1", "rest", "1");
        assert_eq!(id.label(), "sub-01_ses-1_task-rest_run-1");
        assert_eq!(id.to_string(), id.label());
    }

    #[test]
    fn stage_dirs() {
        assert_eq!(Stage::Final.dir_name(), "final");
        assert_eq!(Stage::intermediate("filter_data").dir_name(), "intermediate");
        assert!(!Stage::intermediate("final").is_final());
    }

    #[test]
    fn datatype_serializes_as_plain_string() {
        let json = serde_json::to_string(&DataType::eeg()).unwrap();
        assert_eq!(json, "\"eeg\"");
    }
}
