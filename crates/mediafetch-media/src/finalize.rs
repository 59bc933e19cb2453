//! Moving acquired artifacts into the durable roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use mediafetch_models::{DisplayMetadata, MediaInfo};

use crate::download::AcquisitionResult;
use crate::embed::{embed_cover_art, ContainerFamily};
use crate::error::MediaResult;
use crate::fs_utils::{claim_unique_path, move_file};
use crate::locate::LocatedArtifacts;
use crate::sanitize::Sanitizer;
use crate::thumbnail::{normalize, ImageTranscoder, Normalized};
use crate::workspace::StorageRoots;

const FALLBACK_MEDIA_STEM: &str = "file";
const FALLBACK_THUMB_STEM: &str = "thumb";

/// A finished, delivered-ready media file.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedMedia {
    /// Path of the file in the output root
    #[serde(skip)]
    pub media_path: PathBuf,
    /// Path of the thumbnail in the thumbnail root
    #[serde(skip)]
    pub thumbnail_path: Option<PathBuf>,
    pub metadata: DisplayMetadata,
    /// Non-fatal problems, e.g. cover art that could not be embedded
    pub warnings: Vec<String>,
}

impl FinalizedMedia {
    pub fn file_name(&self) -> &str {
        &self.metadata.filename
    }
}

/// Places artifacts under collision-resistant names and embeds cover art.
pub struct Finalizer {
    roots: StorageRoots,
    sanitizer: Arc<Sanitizer>,
    transcoder: Arc<dyn ImageTranscoder>,
    thumbnail_url_prefix: String,
}

impl Finalizer {
    pub fn new(
        roots: StorageRoots,
        sanitizer: Arc<Sanitizer>,
        transcoder: Arc<dyn ImageTranscoder>,
        thumbnail_url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            roots,
            sanitizer,
            transcoder,
            thumbnail_url_prefix: thumbnail_url_prefix.into(),
        }
    }

    /// Move the media file, then the thumbnail, then embed the cover.
    ///
    /// Only a failure to place the media file is an error. Thumbnail and
    /// embedding problems end up in [`FinalizedMedia::warnings`].
    pub async fn finalize(
        &self,
        acquisition: &AcquisitionResult,
        artifacts: &LocatedArtifacts,
        expected_extension: &str,
    ) -> MediaResult<FinalizedMedia> {
        let info = &acquisition.info;
        let mut warnings = Vec::new();

        let stem = self.stem(info.title.as_deref(), FALLBACK_MEDIA_STEM);
        let id = info
            .id
            .as_deref()
            .map(|id| self.sanitizer.sanitize(id))
            .filter(|id| !id.is_empty());

        let candidates = media_candidates(&stem, id.as_deref(), expected_extension);
        let media_path = self
            .place(&artifacts.media, self.roots.output_dir(), &candidates)
            .await?;
        let file_name = file_name_of(&media_path);
        info!(file = %file_name, "Media file placed");

        let thumbnail_path = match &artifacts.thumbnail {
            Some(thumb) => {
                self.place_thumbnail(thumb, info, id.as_deref(), &media_path, &mut warnings)
                    .await
            }
            None => None,
        };

        let thumbnail_display = thumbnail_path
            .as_deref()
            .map(|p| self.thumbnail_url(&file_name_of(p)))
            .or_else(|| info.thumbnail.clone().filter(|t| !t.trim().is_empty()));

        let metadata = DisplayMetadata::new(info, file_name, expected_extension, thumbnail_display);

        Ok(FinalizedMedia {
            media_path,
            thumbnail_path,
            metadata,
            warnings,
        })
    }

    async fn place_thumbnail(
        &self,
        thumb: &Path,
        info: &MediaInfo,
        id: Option<&str>,
        media_path: &Path,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        let normalized = normalize(thumb, self.transcoder.as_ref()).await?;
        if let Normalized::Original { reason, .. } = &normalized {
            warnings.push(format!("Thumbnail could not be converted to JPEG: {}", reason));
        }
        let is_jpeg = normalized.is_jpeg();
        let source = normalized.into_path();

        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        let stem = self.stem(info.title.as_deref(), FALLBACK_THUMB_STEM);
        let name = match id {
            Some(id) => format!("{}_{}.{}", stem, id, ext),
            None => format!("{}.{}", stem, ext),
        };

        let placed = match self.place(&source, self.roots.thumbnail_dir(), &[name]).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to place thumbnail");
                warnings.push(format!("Thumbnail could not be saved: {}", e));
                return None;
            }
        };

        let family = ContainerFamily::from_path(media_path);
        if family.supports_cover_art() {
            if !is_jpeg {
                warnings.push("Cover art not embedded: thumbnail is not a JPEG".to_string());
            } else if let Err(e) = embed_cover_art(media_path, &placed).await {
                // the media file stays deliverable without cover art
                warn!(error = %e, file = %media_path.display(), "Cover art embedding failed");
                warnings.push(e.to_string());
            }
        }

        Some(placed)
    }

    /// Claim a free name in `dir` and move `source` onto it.
    async fn place(&self, source: &Path, dir: &Path, candidates: &[String]) -> MediaResult<PathBuf> {
        let target = claim_unique_path(dir, candidates).await?;
        if let Err(e) = move_file(source, &target).await {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }
        Ok(target)
    }

    fn stem(&self, text: Option<&str>, fallback: &str) -> String {
        let sanitized = text.map(|t| self.sanitizer.sanitize(t)).unwrap_or_default();
        // a leading dot would hide the file and make it undeliverable
        let stem = sanitized.trim_start_matches(|c: char| c == '.' || c.is_whitespace());
        if stem.is_empty() {
            fallback.to_string()
        } else {
            stem.to_string()
        }
    }

    fn thumbnail_url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.thumbnail_url_prefix.trim_end_matches('/'),
            urlencoding::encode(name)
        )
    }
}

fn media_candidates(stem: &str, id: Option<&str>, ext: &str) -> Vec<String> {
    let mut candidates = vec![format!("{}.{}", stem, ext)];
    if let Some(id) = id {
        candidates.push(format!("{} [{}].{}", stem, id, ext));
    }
    candidates
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::JPEG_COVER;
    use crate::error::MediaError;
    use async_trait::async_trait;

    struct CopyTranscoder;

    #[async_trait]
    impl ImageTranscoder for CopyTranscoder {
        async fn to_jpeg(&self, input: &Path, output: &Path) -> MediaResult<()> {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct BrokenTranscoder;

    #[async_trait]
    impl ImageTranscoder for BrokenTranscoder {
        async fn to_jpeg(&self, _input: &Path, _output: &Path) -> MediaResult<()> {
            Err(MediaError::FfmpegNotFound)
        }
    }

    struct Fixture {
        _base: tempfile::TempDir,
        roots: StorageRoots,
        ws: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let base = tempfile::tempdir().unwrap();
        let roots = StorageRoots::new(base.path().join("out"), base.path().join("thumbs"));
        roots.init().await.unwrap();
        let ws = tempfile::tempdir().unwrap();
        Fixture {
            _base: base,
            roots,
            ws,
        }
    }

    fn finalizer(roots: &StorageRoots, transcoder: Arc<dyn ImageTranscoder>) -> Finalizer {
        Finalizer::new(roots.clone(), Arc::new(Sanitizer::plain()), transcoder, "/thumbnails")
    }

    fn info(title: Option<&str>) -> MediaInfo {
        MediaInfo {
            id: Some("abc123".to_string()),
            title: title.map(str::to_string),
            thumbnail: Some("https://i.ytimg.com/vi/abc123/maxresdefault.webp".to_string()),
            ..Default::default()
        }
    }

    async fn write(path: &Path, bytes: &[u8]) -> PathBuf {
        tokio::fs::write(path, bytes).await.unwrap();
        path.to_path_buf()
    }

    #[tokio::test]
    async fn test_opus_without_cover_slot() {
        let fx = fixture().await;
        let media = write(&fx.ws.path().join("Song.abc123.opus"), b"OggS").await;
        let thumb = write(&fx.ws.path().join("Song.abc123.webp"), b"RIFF").await;

        let acquisition = AcquisitionResult {
            info: info(Some("Song: Live?")),
            files: vec![media.clone(), thumb.clone()],
        };
        let artifacts = LocatedArtifacts {
            media,
            thumbnail: Some(thumb),
        };

        let done = finalizer(&fx.roots, Arc::new(CopyTranscoder))
            .finalize(&acquisition, &artifacts, "opus")
            .await
            .unwrap();

        assert_eq!(done.file_name(), "Song_ Live_.opus");
        assert_eq!(done.media_path, fx.roots.output_dir().join("Song_ Live_.opus"));
        assert_eq!(tokio::fs::read(&done.media_path).await.unwrap(), b"OggS");
        assert_eq!(
            done.thumbnail_path.as_deref(),
            Some(fx.roots.thumbnail_dir().join("Song_ Live__abc123.jpg").as_path())
        );
        assert_eq!(
            done.metadata.thumbnail.as_deref(),
            Some("/thumbnails/Song_%20Live__abc123.jpg")
        );
        assert_eq!(done.metadata.ext, "opus");
        assert!(done.warnings.is_empty(), "{:?}", done.warnings);
    }

    #[tokio::test]
    async fn test_same_title_gets_distinct_names() {
        let fx = fixture().await;
        let f = finalizer(&fx.roots, Arc::new(CopyTranscoder));

        let mut names = Vec::new();
        for i in 0..3 {
            let media = write(&fx.ws.path().join(format!("{}.wav", i)), b"RIFF").await;
            let acquisition = AcquisitionResult {
                info: info(Some("Same")),
                files: vec![media.clone()],
            };
            let artifacts = LocatedArtifacts {
                media,
                thumbnail: None,
            };
            let done = f.finalize(&acquisition, &artifacts, "wav").await.unwrap();
            names.push(done.file_name().to_string());
        }

        assert_eq!(names[0], "Same.wav");
        assert_eq!(names[1], "Same [abc123].wav");
        assert!(names[2].starts_with("Same [abc123]-"));
        assert_ne!(names[1], names[2]);
    }

    #[tokio::test]
    async fn test_remote_thumbnail_fallback_and_empty_title() {
        let fx = fixture().await;
        let media = write(&fx.ws.path().join("x.m4a"), b"....").await;
        let acquisition = AcquisitionResult {
            info: info(Some("???...")),
            files: vec![media.clone()],
        };
        let artifacts = LocatedArtifacts {
            media,
            thumbnail: None,
        };

        let done = finalizer(&fx.roots, Arc::new(CopyTranscoder))
            .finalize(&acquisition, &artifacts, "m4a")
            .await
            .unwrap();

        // "???..." sanitizes to "___..." which keeps its underscores
        assert_eq!(done.file_name(), "___....m4a");
        assert_eq!(
            done.metadata.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/abc123/maxresdefault.webp")
        );

        let media = write(&fx.ws.path().join("y.m4a"), b"....").await;
        let acquisition = AcquisitionResult {
            info: MediaInfo {
                title: Some("...".to_string()),
                ..Default::default()
            },
            files: vec![media.clone()],
        };
        let artifacts = LocatedArtifacts {
            media,
            thumbnail: None,
        };
        let done = finalizer(&fx.roots, Arc::new(CopyTranscoder))
            .finalize(&acquisition, &artifacts, "m4a")
            .await
            .unwrap();
        assert_eq!(done.file_name(), "file.m4a");
        assert_eq!(done.metadata.thumbnail, None);
    }

    #[tokio::test]
    async fn test_dotted_titles_stay_deliverable() {
        let fx = fixture().await;
        let f = finalizer(&fx.roots, Arc::new(CopyTranscoder));

        for (title, expected) in [
            ("Wait... what", "Wait... what.mp4"),
            (". .hack Sign", "hack Sign.mp4"),
            (".hidden", "hidden.mp4"),
        ] {
            let media = write(&fx.ws.path().join("clip.mp4"), b"garbage").await;
            let acquisition = AcquisitionResult {
                info: info(Some(title)),
                files: vec![media.clone()],
            };
            let artifacts = LocatedArtifacts {
                media,
                thumbnail: None,
            };
            let done = f.finalize(&acquisition, &artifacts, "mp4").await.unwrap();

            assert_eq!(done.file_name(), expected);
            assert!(crate::delivery::is_deliverable_name(done.file_name()));
        }
    }

    #[tokio::test]
    async fn test_failed_conversion_is_a_warning() {
        let fx = fixture().await;
        let media = write(&fx.ws.path().join("Clip.mp4"), b"garbage").await;
        let thumb = write(&fx.ws.path().join("Clip.webp"), b"RIFF").await;
        let acquisition = AcquisitionResult {
            info: info(Some("Clip")),
            files: vec![media.clone(), thumb.clone()],
        };
        let artifacts = LocatedArtifacts {
            media,
            thumbnail: Some(thumb),
        };

        let done = finalizer(&fx.roots, Arc::new(BrokenTranscoder))
            .finalize(&acquisition, &artifacts, "mp4")
            .await
            .unwrap();

        assert!(done.media_path.exists());
        assert_eq!(
            done.thumbnail_path.as_deref(),
            Some(fx.roots.thumbnail_dir().join("Clip_abc123.webp").as_path())
        );
        assert_eq!(done.warnings.len(), 2, "{:?}", done.warnings);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_media() {
        let fx = fixture().await;
        let media = write(&fx.ws.path().join("Clip.mp4"), b"garbage").await;
        let thumb = write(&fx.ws.path().join("Clip.jpg"), &JPEG_COVER).await;
        let acquisition = AcquisitionResult {
            info: info(Some("Clip")),
            files: vec![media.clone(), thumb.clone()],
        };
        let artifacts = LocatedArtifacts {
            media,
            thumbnail: Some(thumb),
        };

        let done = finalizer(&fx.roots, Arc::new(CopyTranscoder))
            .finalize(&acquisition, &artifacts, "mp4")
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&done.media_path).await.unwrap(), b"garbage");
        assert_eq!(done.warnings.len(), 1);
        assert!(done.warnings[0].contains("Cover art"), "{:?}", done.warnings);
    }
}
