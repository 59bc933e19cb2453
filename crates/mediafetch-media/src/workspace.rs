//! Storage roots and per-request workspaces.
//!
//! [`StorageRoots`] owns the two process-wide directories finalized files
//! land in. Each request gets its own [`Workspace`] nested under the output
//! root; it is removed when destroyed or dropped, whichever comes first.

use std::cmp::Reverse;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Prefix of workspace directories inside the output root.
pub const WORKSPACE_PREFIX: &str = ".ws-";

/// The durable output and thumbnail roots.
#[derive(Debug, Clone)]
pub struct StorageRoots {
    output: PathBuf,
    thumbnails: PathBuf,
}

impl StorageRoots {
    pub fn new(output: impl Into<PathBuf>, thumbnails: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            thumbnails: thumbnails.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnails
    }

    /// Create both roots. Safe to call more than once.
    pub async fn init(&self) -> MediaResult<()> {
        for dir in [&self.output, &self.thumbnails] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                MediaError::resource(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        info!(
            output = %self.output.display(),
            thumbnails = %self.thumbnails.display(),
            "Storage roots ready"
        );
        Ok(())
    }

    /// Whether both roots currently exist.
    pub fn is_ready(&self) -> bool {
        self.output.is_dir() && self.thumbnails.is_dir()
    }

    /// Create a fresh, uniquely named workspace under the output root.
    pub fn new_workspace(&self) -> MediaResult<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.output)
            .map_err(|e| {
                MediaError::resource(format!(
                    "cannot create workspace in {}: {}",
                    self.output.display(),
                    e
                ))
            })?;
        debug!(workspace = %dir.path().display(), "Created workspace");
        Ok(Workspace { dir: Some(dir) })
    }

    /// Recursively remove both roots.
    ///
    /// Destroys every finalized file not yet delivered. Only call this once
    /// the server has stopped accepting requests.
    pub async fn teardown(&self) {
        for dir in [&self.output, &self.thumbnails] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => info!(dir = %dir.display(), "Removed storage root"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove storage root"),
            }
        }
    }
}

/// A request's private scratch directory.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    /// Path of the workspace directory.
    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            // destroy() consumes self, so a live Workspace always holds its dir
            None => Path::new(""),
        }
    }

    /// Regular files directly inside the workspace, most recently modified
    /// first, ties broken by file name.
    pub fn listing(&self) -> MediaResult<Vec<PathBuf>> {
        list_files(self.path())
    }

    /// Remove the workspace tree. Never fails; errors are logged.
    pub fn destroy(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!(workspace = %path.display(), "Removed workspace"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(workspace = %path.display(), error = %e, "Failed to remove workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}

/// List regular files in `dir` (non-recursive), newest first, then by name.
pub fn list_files(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        MediaError::resource(format!("cannot read {}: {}", dir.display(), e))
    })?;

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(m) => m,
            // removed between read_dir and stat
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, entry.path()));
    }

    files.sort_by(|(ta, pa), (tb, pb)| {
        Reverse(ta)
            .cmp(&Reverse(tb))
            .then_with(|| pa.file_name().cmp(&pb.file_name()))
    });

    Ok(files.into_iter().map(|(_, path)| path).collect())
}
