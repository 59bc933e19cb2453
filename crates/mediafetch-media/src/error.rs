//! Error types for media operations.

use thiserror::Error;

use mediafetch_models::{ProfileError, UrlError};

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Fixed text shown when the video host blocks the request as automated traffic.
pub const BOT_DETECTED_MESSAGE: &str = "Download blocked: the video host suspects automated \
     traffic. Try again later, or configure a cookies file for the extractor.";

/// Errors that can occur while acquiring and post-processing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Video host rejected the request as automated traffic: {message}")]
    BotDetected { message: String },

    #[error("Download failed: {message}")]
    AcquisitionFailed { message: String },

    #[error("URL not supported by the extractor: {0}")]
    UnsupportedUrl(String),

    #[error("No produced file matches the expected output (.{0})")]
    ArtifactNotFound(String),

    #[error("Filesystem error: {0}")]
    Resource(String),

    #[error("Cover art embedding failed: {0}")]
    Embedding(String),

    #[error("yt-dlp not found")]
    YtDlpNotFound,

    #[error("FFmpeg not found")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an acquisition failure error.
    pub fn acquisition_failed(message: impl Into<String>) -> Self {
        Self::AcquisitionFailed {
            message: message.into(),
        }
    }

    /// Create a filesystem resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource(message.into())
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Stable machine-readable code, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            MediaError::Validation(_) => "validation",
            MediaError::BotDetected { .. } => "bot_detected",
            MediaError::AcquisitionFailed { .. } => "acquisition_failed",
            MediaError::UnsupportedUrl(_) => "unsupported_url",
            MediaError::ArtifactNotFound(_) => "not_found",
            MediaError::Resource(_) | MediaError::Io(_) => "resource",
            MediaError::Embedding(_) => "embedding",
            MediaError::YtDlpNotFound | MediaError::FfmpegNotFound => "tool_missing",
            MediaError::FfmpegFailed { .. } => "transcoder_failed",
            MediaError::Timeout(_) => "timeout",
            MediaError::JsonParse(_) => "extractor_output",
        }
    }

    /// Text suitable for showing to the requester.
    pub fn user_message(&self) -> String {
        match self {
            MediaError::BotDetected { .. } => BOT_DETECTED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<UrlError> for MediaError {
    fn from(e: UrlError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ProfileError> for MediaError {
    fn from(e: ProfileError) -> Self {
        Self::Validation(e.to_string())
    }
}
