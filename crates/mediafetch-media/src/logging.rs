//! Request-scoped pipeline logging.

use tracing::{debug, error, info, warn, Span};

use crate::progress::{DownloadProgress, ProgressSink};

/// Logs pipeline stage events with the request id and profile attached.
///
/// Also usable as the [`ProgressSink`] for the extractor, so tool output
/// carries the same context as stage events.
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    request_id: String,
    profile: String,
}

impl PipelineLogger {
    pub fn new(request_id: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            profile: profile.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn log_start(&self, url: &str) {
        info!(
            request_id = %self.request_id,
            profile = %self.profile,
            url = %url,
            "Pipeline started"
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str) {
        debug!(
            request_id = %self.request_id,
            profile = %self.profile,
            stage = stage,
            "Pipeline stage"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            profile = %self.profile,
            "Pipeline warning: {}", message
        );
    }

    pub fn log_error(&self, code: &str, message: &str) {
        error!(
            request_id = %self.request_id,
            profile = %self.profile,
            code = code,
            "Pipeline failed: {}", message
        );
    }

    pub fn log_completion(&self, file_name: &str, elapsed_ms: u128) {
        info!(
            request_id = %self.request_id,
            profile = %self.profile,
            file = %file_name,
            elapsed_ms = elapsed_ms as u64,
            "Pipeline completed"
        );
    }

    /// Span grouping every event of one pipeline run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "pipeline",
            request_id = %self.request_id,
            profile = %self.profile
        )
    }
}

impl ProgressSink for PipelineLogger {
    fn on_progress(&self, progress: &DownloadProgress) {
        if progress.is_complete() {
            info!(
                request_id = %self.request_id,
                total = ?progress.total,
                "Download finished, now post-processing"
            );
        } else {
            debug!(
                request_id = %self.request_id,
                percent = progress.percent,
                speed = ?progress.speed,
                eta = ?progress.eta,
                "Downloading"
            );
        }
    }

    fn on_post_process(&self, step: &str) {
        info!(request_id = %self.request_id, step = step, "Post-processing");
    }

    fn on_log(&self, line: &str) {
        debug!(target: "mediafetch::extractor", request_id = %self.request_id, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_logger_creation() {
        let logger = PipelineLogger::new("req-123", "video_1080");

        assert_eq!(logger.request_id(), "req-123");
        assert_eq!(logger.profile(), "video_1080");
    }

    #[test]
    fn test_logger_as_sink() {
        let logger = PipelineLogger::new("req-1", "mp3");
        let sink: &dyn ProgressSink = &logger;
        sink.on_progress(&DownloadProgress {
            percent: 100.0,
            ..Default::default()
        });
        sink.on_log("[info] done");
    }
}
