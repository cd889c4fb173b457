//! Directory materialization

use crate::error::{StageError, StageResult};
use std::io::ErrorKind;
use std::path::Path;

/// Ensure every directory along `path` exists
///
/// Walks the chain root-to-leaf and creates each missing component.
/// Another worker creating the same component concurrently is fine; a
/// component that exists as a regular file is not.
pub async fn ensure_dir(path: &Path) -> StageResult<()> {
    let mut chain: Vec<&Path> = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    chain.reverse();

    for dir in chain {
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => {
                return Err(StageError::DirectoryCreation {
                    path: dir.to_path_buf(),
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "path component exists and is not a directory",
                    ),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StageError::DirectoryCreation {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        }

        match tokio::fs::create_dir(dir).await {
            Ok(()) => {
                tracing::debug!(path = %dir.display(), "Created directory");
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists && is_dir(dir).await => {}
            Err(e) => {
                return Err(StageError::DirectoryCreation {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Ok(())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_full_chain() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("derivatives/prep/final/sub-01/ses-1/eeg");

        ensure_dir(&target).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn second_call_is_noop() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("a/b/c");
        ensure_dir(&target).await.unwrap();
        std::fs::write(target.join("keep.txt"), b"x").unwrap();

        ensure_dir(&target).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(&target).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn file_in_the_way_is_an_error() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("blocker"), b"x").unwrap();

        let err = ensure_dir(&root.path().join("blocker/child")).await.unwrap_err();

        match err {
            StageError::DirectoryCreation { path, .. } => {
                assert_eq!(path, root.path().join("blocker"));
            }
            other => panic!("Expected DirectoryCreation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_creation_of_same_chain() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("x/y/z/w");

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let t = target.clone();
            set.spawn(async move { ensure_dir(&t).await });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap().unwrap();
        }

        assert!(target.is_dir());
    }
}
