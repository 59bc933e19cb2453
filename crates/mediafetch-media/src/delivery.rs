//! Single-use delivery of finalized files.
//!
//! A file is claimed by renaming it to a hidden name inside the output root.
//! The rename is atomic, so of two requests for the same name only one
//! finds it. The claimed file is removed when the [`DeliveryGuard`] drops.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::workspace::{StorageRoots, WORKSPACE_PREFIX};

/// Prefix of claimed files.
pub const DELIVERING_PREFIX: &str = ".delivering-";

/// Whether `name` is a plain file name that may be served from the output root.
///
/// Dots inside a name are fine (`Wait... what.mp4`); only names that leave
/// the directory, and the root's own claimed files and workspaces, are refused.
pub fn is_deliverable_name(name: &str) -> bool {
    if name.contains(['/', '\\', '\0'])
        || name.starts_with(DELIVERING_PREFIX)
        || name.starts_with(WORKSPACE_PREFIX)
    {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// A claimed file, deleted on drop.
#[derive(Debug)]
pub struct DeliveryGuard {
    path: PathBuf,
    file_name: String,
    len: u64,
}

impl DeliveryGuard {
    /// Path of the claimed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the file was requested by.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.file_name, "File removed after download"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(file = %self.file_name, error = %e, "Failed to remove delivered file"),
        }
    }
}

/// Claim `name` in the output root for streaming.
///
/// Fails with [`MediaError::ArtifactNotFound`] when the name is not
/// deliverable, does not exist, or was already claimed.
pub async fn claim_for_delivery(roots: &StorageRoots, name: &str) -> MediaResult<DeliveryGuard> {
    if !is_deliverable_name(name) {
        return Err(MediaError::ArtifactNotFound(name.to_string()));
    }

    let source = roots.output_dir().join(name);
    let metadata = match tokio::fs::metadata(&source).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(MediaError::ArtifactNotFound(name.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MediaError::ArtifactNotFound(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let claimed = roots
        .output_dir()
        .join(format!("{}{}", DELIVERING_PREFIX, Uuid::new_v4().simple()));

    match tokio::fs::rename(&source, &claimed).await {
        Ok(()) => Ok(DeliveryGuard {
            path: claimed,
            file_name: name.to_string(),
            len: metadata.len(),
        }),
        // lost the race to a concurrent download
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(MediaError::ArtifactNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
