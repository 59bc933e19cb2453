//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use mediafetch_media::{
    check_ffmpeg, check_ytdlp, default_transliterator, Extractor, FfmpegRunner, FfmpegTranscoder,
    ImageTranscoder, Pipeline, Sanitizer, StorageRoots, YtDlpExtractor,
};

use crate::config::ApiConfig;

/// External tools found at startup.
#[derive(Debug, Clone, Default)]
pub struct ToolStatus {
    pub ffmpeg: Option<PathBuf>,
    pub ytdlp: Option<PathBuf>,
}

impl ToolStatus {
    /// Look up FFmpeg and yt-dlp. Missing tools are logged, not fatal.
    pub fn detect(config: &ApiConfig) -> Self {
        let ffmpeg = match check_ffmpeg(config.ffmpeg_path.as_deref()) {
            Ok(path) => {
                info!(path = %path.display(), "FFmpeg found");
                Some(path)
            }
            Err(_) => {
                warn!("FFmpeg not found; thumbnail conversion and audio extraction will fail");
                None
            }
        };
        let ytdlp = match check_ytdlp(&config.ytdlp_path) {
            Ok(path) => {
                info!(path = %path.display(), "yt-dlp found");
                Some(path)
            }
            Err(_) => {
                warn!(binary = %config.ytdlp_path.display(), "yt-dlp not found; downloads will fail");
                None
            }
        };
        Self { ffmpeg, ytdlp }
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg.is_some()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<Pipeline>,
    pub tools: ToolStatus,
    /// Pipeline runs in flight; shutdown waits on these before teardown
    pub tracker: TaskTracker,
}

impl AppState {
    /// Build the production state: yt-dlp extractor and FFmpeg transcoder.
    pub fn new(config: ApiConfig, tools: ToolStatus) -> Self {
        let mut extractor_config = config.extractor_config();
        if extractor_config.ffmpeg_location.is_none() {
            extractor_config.ffmpeg_location = tools.ffmpeg.clone();
        }
        if let Some(ytdlp) = &tools.ytdlp {
            extractor_config.binary = ytdlp.clone();
        }

        let runner = tools
            .ffmpeg
            .clone()
            .map(FfmpegRunner::new)
            .unwrap_or_default()
            .with_timeout(config.ffmpeg_timeout_secs);

        Self::from_parts(
            config,
            tools,
            Arc::new(YtDlpExtractor::new(extractor_config)),
            Arc::new(FfmpegTranscoder::new(runner)),
        )
    }

    /// Build state around the given collaborators.
    pub fn from_parts(
        config: ApiConfig,
        tools: ToolStatus,
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn ImageTranscoder>,
    ) -> Self {
        let roots = StorageRoots::new(&config.output_dir, &config.thumbnail_dir);
        let transliterator = if config.transliterate_filenames {
            default_transliterator()
        } else {
            None
        };

        let pipeline = Pipeline::new(
            roots,
            Sanitizer::new(transliterator),
            extractor,
            transcoder,
            config.thumbnail_url_prefix.clone(),
        );

        Self {
            config,
            pipeline: Arc::new(pipeline),
            tools,
            tracker: TaskTracker::new(),
        }
    }

    pub fn roots(&self) -> &StorageRoots {
        self.pipeline.roots()
    }
}
