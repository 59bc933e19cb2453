//! API error types.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use mediafetch_media::MediaError;

pub type ApiResult<T> = Result<T, ApiError>;

const INTERNAL_ERROR_DETAIL: &str = "An internal error occurred";

/// Response extension marking an error body that carries internal details.
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorDetail {
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(e) => match e {
                MediaError::Validation(_) | MediaError::UnsupportedUrl(_) => {
                    StatusCode::BAD_REQUEST
                }
                MediaError::BotDetected { .. } => StatusCode::SERVICE_UNAVAILABLE,
                MediaError::AcquisitionFailed { .. } | MediaError::JsonParse(_) => {
                    StatusCode::BAD_GATEWAY
                }
                MediaError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
                MediaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                MediaError::Resource(_)
                | MediaError::Embedding(_)
                | MediaError::YtDlpNotFound
                | MediaError::FfmpegNotFound
                | MediaError::FfmpegFailed { .. }
                | MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal",
            ApiError::Media(e) => e.code(),
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
            && !matches!(self, ApiError::Media(MediaError::BotDetected { .. }))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            ApiError::Media(e) => e.user_message(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: Some(self.code().to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        if self.is_internal() {
            response
                .extensions_mut()
                .insert(InternalErrorDetail { code: self.code() });
        }
        response
    }
}

/// Replace internal error details with a generic message.
/// Installed by the router in production.
pub async fn redact_internal_errors(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(marker) = response.extensions().get::<InternalErrorDetail>().copied() else {
        return response;
    };

    let body = ErrorResponse {
        detail: INTERNAL_ERROR_DETAIL.to_string(),
        code: Some(marker.code.to_string()),
    };
    (response.status(), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_media::BOT_DETECTED_MESSAGE;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(MediaError::validation("bad")), StatusCode::BAD_REQUEST),
            (
                ApiError::from(MediaError::BotDetected {
                    message: "x".into(),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(MediaError::acquisition_failed("403")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(MediaError::ArtifactNotFound("mp4".into())),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::from(MediaError::resource("disk")), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_bot_detected_body() {
        let response = ApiError::from(MediaError::BotDetected {
            message: "ERROR: Sign in to confirm".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], BOT_DETECTED_MESSAGE);
        assert_eq!(body["code"], "bot_detected");
    }

    #[test]
    fn test_only_server_errors_are_marked_internal() {
        let response = ApiError::from(MediaError::resource("disk full at /srv")).into_response();
        assert_eq!(
            response.extensions().get::<InternalErrorDetail>().unwrap().code,
            "resource"
        );

        let response = ApiError::bad_request("Please enter a URL.").into_response();
        assert!(response.extensions().get::<InternalErrorDetail>().is_none());

        let response = ApiError::from(MediaError::BotDetected {
            message: "x".into(),
        })
        .into_response();
        assert!(response.extensions().get::<InternalErrorDetail>().is_none());
    }
}
