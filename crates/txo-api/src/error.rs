//! HTTP error taxonomy (spec §7): maps the internal error types from every
//! subsystem onto the status codes and `{detail}` body the HTTP surface
//! promises.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use txo_media::MediaError;
use txo_scheduler::SchedulerError;
use txo_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upload exceeds the configured size cap")]
    TooLarge,

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("admission queue is full")]
    QueueFull,

    #[error("upstream timed out: {0}")]
    GatewayTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "an internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => ApiError::Conflict(format!("task {id} already exists")),
            StoreError::NotFound(id) => ApiError::NotFound(format!("task {id} not found")),
            StoreError::IllegalTransition(e) => ApiError::Conflict(e.to_string()),
            StoreError::Persist(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::QueueFull => ApiError::QueueFull,
            SchedulerError::NotFound(id) => ApiError::NotFound(format!("task {id} not found")),
            SchedulerError::Store(e) => e.into(),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedFormat(ext) => ApiError::UnsupportedMedia(ext),
            MediaError::TooLarge => ApiError::TooLarge,
            MediaError::DecoderTimeout(secs) => {
                ApiError::GatewayTimeout(format!("decoder timed out after {secs}s"))
            }
            MediaError::DecoderError { message, .. } => ApiError::Internal(message),
            MediaError::FfmpegNotFound => ApiError::Internal("ffmpeg not found".to_string()),
            MediaError::Cancelled => ApiError::Internal("extraction was canceled".to_string()),
            MediaError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<txo_ingest::IngestError> for ApiError {
    fn from(err: txo_ingest::IngestError) -> Self {
        match err {
            txo_ingest::IngestError::UnsupportedExtension(ext) => ApiError::UnsupportedMedia(ext),
            txo_ingest::IngestError::TooLarge => ApiError::TooLarge,
            txo_ingest::IngestError::Io(e) => ApiError::Internal(e.to_string()),
            txo_ingest::IngestError::Media(e) => e.into(),
            txo_ingest::IngestError::Store(e) => e.into(),
            txo_ingest::IngestError::Scheduler(e) => e.into(),
        }
    }
}
