//! Single-use file delivery.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::info;

use mediafetch_media::{claim_for_delivery, MediaError};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Stream a finalized file once, then delete it.
///
/// The file is claimed before the response starts, so a repeated or
/// concurrent request for the same name gets 404. Deletion happens when the
/// body is dropped, whether the transfer completed or was aborted.
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let guard = claim_for_delivery(state.roots(), &filename)
        .await
        .map_err(|e| match e {
            MediaError::ArtifactNotFound(_) => {
                metrics::record_download_not_found();
                ApiError::not_found("File not found")
            }
            other => ApiError::from(other),
        })?;

    let file = tokio::fs::File::open(guard.path()).await.map_err(|e| {
        ApiError::internal(format!("cannot open claimed file: {}", e))
    })?;
    let len = guard.len();

    info!(file = %guard.file_name(), bytes = len, "Delivering file");
    metrics::record_download_delivered(len);

    let disposition = content_disposition(guard.file_name());
    // the guard lives as long as the body stream
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _held = &guard;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}
