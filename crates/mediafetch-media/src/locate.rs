//! Identify the primary media file and thumbnail among extraction outputs.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Image extensions yt-dlp writes thumbnails with. Matched case-insensitively.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "png", "webp", "jpeg"];

/// How a workspace file is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PrimaryMedia,
    ThumbnailImage,
    Other,
}

/// Classify one file by extension.
pub fn classify(path: &Path, expected_extension: &str) -> ArtifactKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return ArtifactKind::Other;
    };

    if ext == expected_extension {
        ArtifactKind::PrimaryMedia
    } else if THUMBNAIL_EXTENSIONS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(ext))
    {
        ArtifactKind::ThumbnailImage
    } else {
        ArtifactKind::Other
    }
}

/// Artifacts picked from a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifacts {
    pub media: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

/// Pick the primary media file and an optional thumbnail from `listing`.
///
/// The first match in listing order wins for both. When the expected
/// extension is itself an image extension, the media file is never also
/// offered as its own thumbnail.
pub fn locate(listing: &[PathBuf], expected_extension: &str) -> MediaResult<LocatedArtifacts> {
    let mut media = None;
    let mut thumbnail = None;

    for path in listing {
        match classify(path, expected_extension) {
            ArtifactKind::PrimaryMedia if media.is_none() => media = Some(path.clone()),
            ArtifactKind::ThumbnailImage if thumbnail.is_none() => thumbnail = Some(path.clone()),
            _ => {}
        }
    }

    let media = media.ok_or_else(|| MediaError::ArtifactNotFound(expected_extension.to_string()))?;

    Ok(LocatedArtifacts { media, thumbnail })
}
