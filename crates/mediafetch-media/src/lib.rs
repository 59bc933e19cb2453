#![deny(unreachable_patterns)]
//! Acquisition and post-processing pipeline.
//!
//! This crate provides:
//! - Per-request workspaces under shared, lifecycle-managed storage roots
//! - yt-dlp invocation with progress parsing and failure classification
//! - Artifact discovery, JPEG thumbnail normalization via FFmpeg
//! - Cover-art embedding for MP3 and MP4-family files
//! - Collision-resistant finalization and single-use delivery

pub mod command;
pub mod delivery;
pub mod download;
pub mod embed;
pub mod error;
pub mod finalize;
pub mod fs_utils;
pub mod locate;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod sanitize;
pub mod thumbnail;
pub mod workspace;

#[cfg(test)]
mod test_fixtures;

pub use command::{
    check_ffmpeg, check_ytdlp, FfmpegCommand, FfmpegRunner, DEFAULT_FFMPEG_TIMEOUT_SECS,
};
pub use delivery::{claim_for_delivery, is_deliverable_name, DeliveryGuard};
pub use download::{
    acquire, build_args, classify_failure, AcquisitionResult, ExtractionRequest, Extractor,
    ExtractorConfig, YtDlpExtractor,
};
pub use embed::{embed_cover_art, ContainerFamily};
pub use error::{MediaError, MediaResult, BOT_DETECTED_MESSAGE};
pub use finalize::{FinalizedMedia, Finalizer};
pub use locate::{locate, ArtifactKind, LocatedArtifacts, THUMBNAIL_EXTENSIONS};
pub use logging::PipelineLogger;
pub use pipeline::{DownloadRequest, Pipeline};
pub use progress::{DownloadProgress, LogSink, ProgressSink};
pub use sanitize::{default_transliterator, Sanitizer, Transliterator};
pub use thumbnail::{normalize, FfmpegTranscoder, ImageTranscoder, Normalized};
pub use workspace::{StorageRoots, Workspace};
