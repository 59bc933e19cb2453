//! Submission handlers: the profile catalogue and running the pipeline.

use axum::extract::State;
use axum::{Extension, Form, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use mediafetch_media::DownloadRequest;
use mediafetch_models::{DisplayMetadata, ProfileOption, PROFILE_OPTIONS};

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::state::AppState;

/// `GET /` response.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub profiles: &'static [ProfileOption],
    pub ffmpeg_available: bool,
}

/// Submission form. `format` is accepted as an alias of `profile`.
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "format")]
    pub profile: Option<String>,
}

/// `POST /` response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub metadata: DisplayMetadata,
    /// Single-use link to the finished file
    pub download_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// List the offered profiles.
pub async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        profiles: PROFILE_OPTIONS,
        ffmpeg_available: state.tools.ffmpeg_available(),
    })
}

/// Run the pipeline for one URL and profile.
///
/// The pipeline runs in its own tracked task, so a client that disconnects
/// does not abort a run half way, and shutdown waits for the run to finish
/// before tearing the storage roots down.
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Form(form): Form<SubmitForm>,
) -> ApiResult<Json<SubmitResponse>> {
    let url = form
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please enter a URL."))?;
    let profile = form
        .profile
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please choose an output profile."))?;

    let pipeline = state.pipeline.clone();
    let request = DownloadRequest::new(url, profile);
    let id = request_id.as_str().to_string();

    let finalized = state
        .tracker
        .spawn(async move { pipeline.run(&request, &id).await })
        .await
        .map_err(|e| {
            error!(request_id = %request_id.as_str(), "Pipeline task failed: {}", e);
            ApiError::internal("pipeline task failed")
        })??;

    let download_url = format!(
        "/download/{}",
        urlencoding::encode(finalized.file_name())
    );

    Ok(Json(SubmitResponse {
        message: "Download complete",
        metadata: finalized.metadata,
        download_url,
        warnings: finalized.warnings,
    }))
}
