//! Completion oracle
//!
//! Answers "does a final artifact already exist for this recording?" so the
//! pipeline can skip it. The match fixes identity, data type and pipeline
//! name and leaves the extension open, so a continuous `.fif` and an
//! epoched `_epo.fif` both count. Existence only; contents are not checked.

use crate::error::{RecordingResult, StageError};
use crate::identity::{DataType, RecordingIdentity, Stage};
use crate::layout::StagingLayout;
use prep_common::fs::TEMP_SUFFIX;
use std::io::ErrorKind;

/// True iff a final artifact exists and `rewrite` is false
///
/// With `rewrite` set the filesystem is not consulted at all.
pub async fn is_complete(
    layout: &StagingLayout,
    identity: &RecordingIdentity,
    datatype: &DataType,
    rewrite: bool,
) -> RecordingResult<bool> {
    if rewrite {
        return Ok(false);
    }

    let dir = layout.stage_dir(identity, datatype, &Stage::Final);
    let stem = layout.file_stem(identity, datatype, &Stage::Final);

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StageError::Io(e).for_recording(identity, datatype)),
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(StageError::Io(e).for_recording(identity, datatype)),
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        // An in-flight atomic write is not a finished artifact
        if name.starts_with(&stem) && !name.ends_with(TEMP_SUFFIX) {
            tracing::debug!(
                recording = %identity,
                datatype = %datatype,
                file = name,
                "Final artifact present"
            );
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rest() -> RecordingIdentity {
        RecordingIdentity::new("01", "1", "rest", "1")
    }

    async fn place_final(layout: &StagingLayout, name: &str) {
        let dir = layout.stage_dir(&rest(), &DataType::eeg(), &Stage::Final);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(name), b"fif").await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_not_complete() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());

        assert!(!is_complete(&layout, &rest(), &DataType::eeg(), false).await.unwrap());
    }

    #[tokio::test]
    async fn existing_final_is_complete_unless_rewrite() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());
        place_final(&layout, "sub-01_ses-1_task-rest_run-1_proc-prep_eeg.fif").await;

        assert!(is_complete(&layout, &rest(), &DataType::eeg(), false).await.unwrap());
        assert!(!is_complete(&layout, &rest(), &DataType::eeg(), true).await.unwrap());
    }

    #[tokio::test]
    async fn any_extension_counts() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());
        place_final(&layout, "sub-01_ses-1_task-rest_run-1_proc-prep_eeg_epo.fif").await;

        assert!(is_complete(&layout, &rest(), &DataType::eeg(), false).await.unwrap());
    }

    #[tokio::test]
    async fn other_run_or_report_does_not_count() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());
        place_final(&layout, "sub-01_ses-1_task-rest_run-2_proc-prep_eeg.fif").await;
        place_final(&layout, "output_preproc_sub-01_ses-1_task-rest_run-1_eeg.json").await;

        assert!(!is_complete(&layout, &rest(), &DataType::eeg(), false).await.unwrap());
    }

    #[tokio::test]
    async fn temp_file_does_not_count() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());
        place_final(&layout, "sub-01_ses-1_task-rest_run-1_proc-prep_eeg.fif.tmp").await;

        assert!(!is_complete(&layout, &rest(), &DataType::eeg(), false).await.unwrap());
    }
}
