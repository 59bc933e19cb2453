//! Thumbnail normalization to JPEG.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Converts one image file to JPEG.
#[async_trait]
pub trait ImageTranscoder: Send + Sync {
    /// Write `output` as a JPEG rendering of `input`.
    async fn to_jpeg(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Transcoder backed by the ffmpeg binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ImageTranscoder for FfmpegTranscoder {
    async fn to_jpeg(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .single_frame()
            .log_level("error");
        self.runner.run(&cmd).await
    }
}

/// Outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The image is JPEG, either already or after conversion.
    Jpeg(PathBuf),
    /// Conversion failed; the original image is kept.
    Original { path: PathBuf, reason: String },
}

impl Normalized {
    pub fn path(&self) -> &Path {
        match self {
            Normalized::Jpeg(path) => path,
            Normalized::Original { path, .. } => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Normalized::Jpeg(path) => path,
            Normalized::Original { path, .. } => path,
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, Normalized::Jpeg(_))
    }
}

/// Make sure a thumbnail is a `.jpg` file.
///
/// A `.jpg` input is returned as is. Anything else is converted to a sibling
/// `.jpg`, and the original is removed once the conversion produced a file.
/// Returns `None` only when `image` does not exist.
pub async fn normalize(image: &Path, transcoder: &dyn ImageTranscoder) -> Option<Normalized> {
    if !tokio::fs::try_exists(image).await.unwrap_or(false) {
        return None;
    }

    if image.extension().and_then(|e| e.to_str()) == Some("jpg") {
        return Some(Normalized::Jpeg(image.to_path_buf()));
    }

    let target = image.with_extension("jpg");
    let converted = match transcoder.to_jpeg(image, &target).await {
        Ok(()) if tokio::fs::try_exists(&target).await.unwrap_or(false) => Ok(()),
        Ok(()) => Err("transcoder produced no output".to_string()),
        Err(e) => Err(e.to_string()),
    };

    match converted {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(image).await {
                warn!(path = %image.display(), error = %e, "Failed to remove original thumbnail");
            }
            debug!(path = %target.display(), "Thumbnail converted to JPEG");
            Some(Normalized::Jpeg(target))
        }
        Err(reason) => {
            // a partial output must not be mistaken for a finished conversion
            let _ = tokio::fs::remove_file(&target).await;
            warn!(path = %image.display(), reason = %reason, "Thumbnail conversion failed, keeping original");
            Some(Normalized::Original {
                path: image.to_path_buf(),
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CopyTranscoder;

    #[async_trait]
    impl ImageTranscoder for CopyTranscoder {
        async fn to_jpeg(&self, input: &Path, output: &Path) -> MediaResult<()> {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct FailingTranscoder;

    #[async_trait]
    impl ImageTranscoder for FailingTranscoder {
        async fn to_jpeg(&self, _input: &Path, output: &Path) -> MediaResult<()> {
            tokio::fs::write(output, b"partial").await?;
            Err(MediaError::ffmpeg_failed("exit 1", None, Some(1)))
        }
    }

    #[derive(Default)]
    struct CountingTranscoder(AtomicUsize);

    #[async_trait]
    impl ImageTranscoder for CountingTranscoder {
        async fn to_jpeg(&self, _input: &Path, _output: &Path) -> MediaResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_webp_is_converted_and_original_removed() {
        let dir = tempfile::tempdir().unwrap();
        let webp = dir.path().join("thumb.webp");
        tokio::fs::write(&webp, b"RIFF").await.unwrap();

        let result = normalize(&webp, &CopyTranscoder).await.unwrap();

        assert_eq!(result, Normalized::Jpeg(dir.path().join("thumb.jpg")));
        assert!(result.path().exists());
        assert!(!webp.exists());
    }

    #[tokio::test]
    async fn test_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("thumb.png");
        tokio::fs::write(&png, b"PNG").await.unwrap();

        let result = normalize(&png, &FailingTranscoder).await.unwrap();

        assert!(!result.is_jpeg());
        assert_eq!(result.path(), png.as_path());
        assert!(png.exists());
        assert!(!dir.path().join("thumb.jpg").exists());
    }

    #[tokio::test]
    async fn test_no_output_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let webp = dir.path().join("thumb.webp");
        tokio::fs::write(&webp, b"RIFF").await.unwrap();

        let transcoder = CountingTranscoder::default();
        let result = normalize(&webp, &transcoder).await.unwrap();

        assert_eq!(transcoder.0.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Normalized::Original { .. }));
        assert!(webp.exists());
    }

    #[tokio::test]
    async fn test_jpg_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("thumb.jpg");
        tokio::fs::write(&jpg, b"JFIF").await.unwrap();

        let transcoder = CountingTranscoder::default();
        let result = normalize(&jpg, &transcoder).await.unwrap();

        assert_eq!(result, Normalized::Jpeg(jpg));
        assert_eq!(transcoder.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = normalize(&dir.path().join("absent.webp"), &CopyTranscoder).await;
        assert!(result.is_none());
    }
}
