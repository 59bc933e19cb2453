//! Filesystem utilities for moving artifacts into the shared roots.
//!
//! The output and thumbnail roots are shared by every in-flight request, so
//! destination names are claimed atomically before anything is moved there.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// This function first attempts a fast rename. If that fails with EXDEV
/// (cross-device link error), it falls back to copy-and-delete.
/// An existing `dst` is replaced.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_dst);
        MediaError::from(e)
    })?;

    // The source lives in a workspace that is about to be destroyed anyway
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Atomically reserve the first free name among `candidates` in `dir`.
///
/// The reservation is an empty file created with `create_new`, so two
/// requests can never claim the same name. If every candidate is taken a
/// random suffix is appended to the last one. The caller moves its file
/// over the returned path, or removes it on failure.
pub async fn claim_unique_path(dir: &Path, candidates: &[String]) -> MediaResult<PathBuf> {
    for name in candidates {
        let path = dir.join(name);
        if try_create_new(&path).await? {
            return Ok(path);
        }
    }

    let last = candidates
        .last()
        .ok_or_else(|| MediaError::resource("no candidate file names"))?;
    let (stem, ext) = split_name(last);

    for _ in 0..8 {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let name = match ext {
            Some(ext) => format!("{}-{}.{}", stem, suffix, ext),
            None => format!("{}-{}", stem, suffix),
        };
        let path = dir.join(name);
        if try_create_new(&path).await? {
            return Ok(path);
        }
    }

    Err(MediaError::resource(format!(
        "could not reserve a unique name for {} in {}",
        last,
        dir.display()
    )))
}

async fn try_create_new(path: &Path) -> MediaResult<bool> {
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(MediaError::resource(format!(
            "cannot create {}: {}",
            path.display(),
            e
        ))),
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists(), "Source file should be removed");
        assert!(dst.exists(), "Destination file should exist");
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_reservation() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        fs::write(&src, b"new content").await.unwrap();

        let dst = claim_unique_path(dir.path(), &["dest.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(fs::read(&dst).await.unwrap().len(), 0);

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new content");
    }

    #[tokio::test]
    async fn test_claim_skips_taken_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Title.mp4"), b"x").await.unwrap();

        let candidates = vec!["Title.mp4".to_string(), "Title [abc].mp4".to_string()];
        let first = claim_unique_path(dir.path(), &candidates).await.unwrap();
        assert_eq!(first, dir.path().join("Title [abc].mp4"));

        let second = claim_unique_path(dir.path(), &candidates).await.unwrap();
        let name = second.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Title [abc]-"), "{}", name);
        assert!(name.ends_with(".mp4"), "{}", name);
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_collide() {
        let dir = TempDir::new().unwrap();
        let candidates = vec!["Same.mp3".to_string()];

        let claims = futures_join(dir.path(), &candidates).await;
        let mut names: Vec<_> = claims.iter().map(|p| p.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), claims.len());
    }

    async fn futures_join(dir: &Path, candidates: &[String]) -> Vec<PathBuf> {
        let mut handles = Vec::new();
        for _ in 0..8 {
            let dir = dir.to_path_buf();
            let candidates = candidates.to_vec();
            handles.push(tokio::spawn(async move {
                claim_unique_path(&dir, &candidates).await.unwrap()
            }));
        }
        let mut out = Vec::new();
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    }

    #[test]
    fn test_is_cross_device_error() {
        let exdev_error = std::io::Error::from_raw_os_error(18);
        assert!(is_cross_device_error(&exdev_error));

        let not_found = std::io::Error::from_raw_os_error(2);
        assert!(!is_cross_device_error(&not_found));
    }
}
