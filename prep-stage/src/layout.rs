//! Derivative hierarchy layout
//!
//! Maps (recording, data type, stage) to a directory and file name:
//!
//! ```text
//! <root>/derivatives/<pipeline>/<final|intermediate>/sub-<S>/ses-<E>/<datatype>/
//!     sub-<S>_ses-<E>_task-<T>_run-<R>_proc-<tag>_<datatype><ext>
//! ```
//!
//! Everything here is pure string/path formatting: no filesystem access,
//! no errors.

use crate::identity::{DataType, RecordingIdentity, SignalKind, Stage};
use std::path::{Path, PathBuf};

/// Pipeline name used when none is configured
pub const DEFAULT_PIPELINE_NAME: &str = "prep";

/// Top-level directory holding pipeline outputs under the data root
pub const DERIVATIVES_DIR: &str = "derivatives";

/// Resolved location of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub directory: PathBuf,
    pub file_name: String,
}

impl ArtifactLocation {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Root and pipeline name from which every artifact path is derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    root: PathBuf,
    pipeline_name: String,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_pipeline_name(root, DEFAULT_PIPELINE_NAME)
    }

    pub fn with_pipeline_name(root: impl Into<PathBuf>, pipeline_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pipeline_name: pipeline_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// `<root>/derivatives/<pipeline>`
    pub fn pipeline_dir(&self) -> PathBuf {
        self.root.join(DERIVATIVES_DIR).join(&self.pipeline_name)
    }

    /// Directory holding the artifacts of `stage` for one recording
    pub fn stage_dir(&self, identity: &RecordingIdentity, datatype: &DataType, stage: &Stage) -> PathBuf {
        self.pipeline_dir()
            .join(stage.dir_name())
            .join(format!("sub-{}", identity.subject))
            .join(format!("ses-{}", identity.session))
            .join(datatype.as_str())
    }

    /// `proc-` value for `stage`
    ///
    /// Final artifacts carry the pipeline name; intermediate tags lose
    /// their `_` separators so the entity stays a single BIDS-like token.
    pub fn stage_tag(&self, stage: &Stage) -> String {
        match stage {
            Stage::Final => self.pipeline_name.clone(),
            Stage::Intermediate(tag) => compact_tag(tag),
        }
    }

    /// File name up to (not including) the extension
    pub fn file_stem(&self, identity: &RecordingIdentity, datatype: &DataType, stage: &Stage) -> String {
        format!(
            "{}_proc-{}_{}",
            identity.label(),
            self.stage_tag(stage),
            datatype
        )
    }

    /// Directory and file name for an artifact
    pub fn resolve(
        &self,
        identity: &RecordingIdentity,
        datatype: &DataType,
        stage: &Stage,
        kind: SignalKind,
    ) -> ArtifactLocation {
        ArtifactLocation {
            directory: self.stage_dir(identity, datatype, stage),
            file_name: format!(
                "{}{}",
                self.file_stem(identity, datatype, stage),
                kind.extension()
            ),
        }
    }

    /// Location of the aggregated parameter report for one recording
    ///
    /// Reports live next to the final artifact.
    pub fn report_location(&self, identity: &RecordingIdentity, datatype: &DataType) -> ArtifactLocation {
        ArtifactLocation {
            directory: self.stage_dir(identity, datatype, &Stage::Final),
            file_name: format!("output_preproc_{}_{}.json", identity.label(), datatype),
        }
    }
}

/// Strip word separators from a processing-step tag
pub fn compact_tag(tag: &str) -> String {
    tag.replace('_', "")
}
