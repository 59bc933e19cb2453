//! The end-to-end acquisition pipeline.
//!
//! One run: validate, create a workspace, acquire, locate, finalize, and
//! destroy the workspace. Validation happens before any filesystem work, and
//! the workspace is removed on every exit path.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::Instrument;

use mediafetch_models::{MediaUrl, Profile};

use crate::download::{acquire, Extractor};
use crate::error::MediaResult;
use crate::finalize::{FinalizedMedia, Finalizer};
use crate::locate::locate;
use crate::logging::PipelineLogger;
use crate::progress::ProgressSink;
use crate::sanitize::Sanitizer;
use crate::thumbnail::ImageTranscoder;
use crate::workspace::{StorageRoots, Workspace};

/// Pipeline metric names.
pub mod names {
    pub const PIPELINE_RUNS_TOTAL: &str = "mediafetch_pipeline_runs_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "mediafetch_pipeline_duration_seconds";
    pub const PIPELINE_WARNINGS_TOTAL: &str = "mediafetch_pipeline_warnings_total";
}

/// A submitted URL and profile token, not yet validated.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub profile: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            profile: profile.into(),
        }
    }
}

pub struct Pipeline {
    roots: StorageRoots,
    extractor: Arc<dyn Extractor>,
    finalizer: Finalizer,
}

impl Pipeline {
    pub fn new(
        roots: StorageRoots,
        sanitizer: Sanitizer,
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn ImageTranscoder>,
        thumbnail_url_prefix: impl Into<String>,
    ) -> Self {
        let finalizer = Finalizer::new(
            roots.clone(),
            Arc::new(sanitizer),
            transcoder,
            thumbnail_url_prefix,
        );
        Self {
            roots,
            extractor,
            finalizer,
        }
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    /// Run the pipeline, reporting extractor progress to the log.
    pub async fn run(&self, request: &DownloadRequest, request_id: &str) -> MediaResult<FinalizedMedia> {
        let logger = PipelineLogger::new(request_id, request.profile.trim());
        self.run_with_sink(request, &logger, &logger).await
    }

    /// Run the pipeline with a caller-supplied progress sink.
    pub async fn run_with_sink(
        &self,
        request: &DownloadRequest,
        logger: &PipelineLogger,
        sink: &dyn ProgressSink,
    ) -> MediaResult<FinalizedMedia> {
        let span = logger.create_span();
        async {
            let start = Instant::now();
            logger.log_start(request.url.trim());

            let result = self.execute(request, logger, sink).await;

            let outcome = match &result {
                Ok(_) => "success",
                Err(e) => e.code(),
            };
            counter!(names::PIPELINE_RUNS_TOTAL, "outcome" => outcome).increment(1);
            histogram!(names::PIPELINE_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

            match &result {
                Ok(done) => {
                    for warning in &done.warnings {
                        logger.log_warning(warning);
                        counter!(names::PIPELINE_WARNINGS_TOTAL).increment(1);
                    }
                    logger.log_completion(done.file_name(), start.elapsed().as_millis());
                }
                Err(e) => logger.log_error(e.code(), &e.to_string()),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &DownloadRequest,
        logger: &PipelineLogger,
        sink: &dyn ProgressSink,
    ) -> MediaResult<FinalizedMedia> {
        // Nothing touches the filesystem until both inputs are valid.
        let url = MediaUrl::parse(&request.url)?;
        let profile: Profile = request.profile.parse()?;
        let spec = profile.resolve();

        let workspace = self.roots.new_workspace()?;
        let result = self.process(&url, &spec, &workspace, logger, sink).await;
        workspace.destroy();
        result
    }

    async fn process(
        &self,
        url: &MediaUrl,
        spec: &mediafetch_models::ExtractionSpec,
        workspace: &Workspace,
        logger: &PipelineLogger,
        sink: &dyn ProgressSink,
    ) -> MediaResult<FinalizedMedia> {
        logger.log_stage("acquire");
        let acquisition = acquire(self.extractor.as_ref(), url, spec, workspace, sink).await?;

        logger.log_stage("locate");
        let artifacts = locate(&acquisition.files, spec.expected_extension)?;

        logger.log_stage("finalize");
        self.finalizer
            .finalize(&acquisition, &artifacts, spec.expected_extension)
            .await
    }
}
