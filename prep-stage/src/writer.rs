//! Artifact writer
//!
//! Persists per-stage signal objects and the final parameter report under
//! their derived paths. Writes always overwrite and go through a temp file
//! plus rename, so the completion oracle never sees a half-written
//! artifact. Callers that want skip-on-exists consult
//! [`is_complete`](crate::completion::is_complete) first.

use crate::error::{RecordingResult, StageError};
use crate::fs::ensure_dir;
use crate::identity::{DataType, RecordingIdentity, SignalKind, Stage};
use crate::layout::StagingLayout;
use serde::Serialize;

/// A processed signal object handed in by a processing stage
///
/// The on-disk format belongs to the implementor; the writer only needs
/// the bytes and whether the object is epoched. The same bytes are what
/// callers should feed to the fingerprint ledger.
pub trait SignalData {
    fn kind(&self) -> SignalKind;

    fn encode(&self) -> anyhow::Result<Vec<u8>>;
}

/// Write one stage's object; returns the file name written
pub async fn write_artifact<S: SignalData + ?Sized>(
    layout: &StagingLayout,
    object: &S,
    stage: &Stage,
    identity: &RecordingIdentity,
    datatype: &DataType,
) -> RecordingResult<String> {
    let location = layout.resolve(identity, datatype, stage, object.kind());

    ensure_dir(&location.directory)
        .await
        .map_err(|e| e.for_recording(identity, datatype))?;

    let bytes = object.encode().map_err(|e| {
        StageError::Serialization(format!("{:#}", e)).for_recording(identity, datatype)
    })?;

    let path = location.path();
    prep_common::fs::write_atomic(&path, &bytes)
        .await
        .map_err(|e| StageError::from(e).for_recording(identity, datatype))?;

    tracing::info!(
        recording = %identity,
        datatype = %datatype,
        stage = %layout.stage_tag(stage),
        path = %path.display(),
        bytes = bytes.len(),
        "Wrote artifact"
    );

    Ok(location.file_name)
}

/// Write the aggregated parameter report; returns the file name written
///
/// Content is JSON indented by four spaces.
pub async fn write_report<P: Serialize + ?Sized>(
    layout: &StagingLayout,
    params: &P,
    identity: &RecordingIdentity,
    datatype: &DataType,
) -> RecordingResult<String> {
    let location = layout.report_location(identity, datatype);

    ensure_dir(&location.directory)
        .await
        .map_err(|e| e.for_recording(identity, datatype))?;

    let bytes = to_indented_json(params).map_err(|e| e.for_recording(identity, datatype))?;

    let path = location.path();
    prep_common::fs::write_atomic(&path, &bytes)
        .await
        .map_err(|e| StageError::from(e).for_recording(identity, datatype))?;

    tracing::info!(
        recording = %identity,
        datatype = %datatype,
        path = %path.display(),
        "Wrote parameter report"
    );

    Ok(location.file_name)
}

/// Serialize as JSON indented by four spaces
pub fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StageError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct FakeRaw(&'static [u8]);

    impl SignalData for FakeRaw {
        fn kind(&self) -> SignalKind {
            SignalKind::Continuous
        }

        fn encode(&self) -> anyhow::Result<Vec<u8>> {
            Ok(self.0.to_vec())
        }
    }

    struct Unencodable;

    impl SignalData for Unencodable {
        fn kind(&self) -> SignalKind {
            SignalKind::Epoched
        }

        fn encode(&self) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("channel info missing")
        }
    }

    fn rest() -> RecordingIdentity {
        RecordingIdentity::new("01", "1", "rest", "1")
    }

    #[tokio::test]
    async fn writes_intermediate_under_compact_tag() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());

        let name = write_artifact(
            &layout,
            &FakeRaw(b"filtered"),
            &Stage::intermediate("filter_data"),
            &rest(),
            &DataType::eeg(),
        )
        .await
        .unwrap();

        assert_eq!(name, "sub-01_ses-1_task-rest_run-1_proc-filterdata_eeg.fif");
        let path = root
            .path()
            .join("derivatives/prep/intermediate/sub-01/ses-1/eeg")
            .join(&name);
        assert_eq!(std::fs::read(path).unwrap(), b"filtered");
    }

    #[tokio::test]
    async fn overwrites_existing_artifact() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());

        for payload in [FakeRaw(b"first"), FakeRaw(b"second")] {
            write_artifact(&layout, &payload, &Stage::Final, &rest(), &DataType::eeg())
                .await
                .unwrap();
        }

        let loc = layout.resolve(&rest(), &DataType::eeg(), &Stage::Final, SignalKind::Continuous);
        assert_eq!(std::fs::read(loc.path()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn encode_failure_is_attributed() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());

        let err = write_artifact(&layout, &Unencodable, &Stage::Final, &rest(), &DataType::eeg())
            .await
            .unwrap_err();

        assert_eq!(err.recording, rest());
        assert!(matches!(err.source, StageError::Serialization(_)));
        assert!(err.to_string().contains("channel info missing"));

        let loc = layout.resolve(&rest(), &DataType::eeg(), &Stage::Final, SignalKind::Epoched);
        assert!(!loc.path().exists());
    }

    #[tokio::test]
    async fn report_is_indented_json() {
        let root = TempDir::new().unwrap();
        let layout = StagingLayout::new(root.path());
        let params = json!({ "filter_data": { "l_freq": 0.3 } });

        let name = write_report(&layout, &params, &rest(), &DataType::eeg())
            .await
            .unwrap();

        assert_eq!(name, "output_preproc_sub-01_ses-1_task-rest_run-1_eeg.json");
        let text = std::fs::read_to_string(layout.report_location(&rest(), &DataType::eeg()).path()).unwrap();
        assert!(text.contains("\n    \"filter_data\": {\n        \"l_freq\": 0.3"));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, params);
    }
}
