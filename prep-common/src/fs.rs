//! Atomic file writes (temp file + rename)
//!
//! Readers either see the previous content or the complete new content,
//! never a partially written file. The temp file sits next to the target
//! so the rename stays on one filesystem.

use crate::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to the target name while a write is in flight
pub const TEMP_SUFFIX: &str = ".tmp";

/// Temp path used while writing `target` (`<target>.tmp`)
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    target.with_file_name(name)
}

/// Atomically replace `target` with `contents`
pub async fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_path_for(target);

    if let Err(e) = tokio::fs::write(&temp, contents).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::rename(&temp, target).await {
        tracing::error!(
            temp = %temp.display(),
            target = %target.display(),
            error = %e,
            "Atomic write failed: rename"
        );
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }

    Ok(())
}

/// Blocking variant of [`write_atomic`] for synchronous callers
pub fn write_atomic_blocking(target: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_path_for(target);

    if let Err(e) = std::fs::write(&temp, contents) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }

    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn temp_path_appends_suffix() {
        let temp = temp_path_for(Path::new("/a/b/sub-01_eeg.fif"));
        assert_eq!(temp, PathBuf::from("/a/b/sub-01_eeg.fif.tmp"));
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.json");

        write_atomic(&target, b"first").await.unwrap();
        write_atomic(&target, b"second").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn write_atomic_fails_when_parent_missing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("out.json");

        assert!(write_atomic(&target, b"x").await.is_err());
        assert!(!target.exists());
    }
}
