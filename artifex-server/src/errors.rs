use artifex_core::{CoreError, MediaServerError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Maps core errors onto HTTP statuses at the adapter boundary.
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<MediaServerError> for ApiError {
    fn from(err: MediaServerError) -> Self {
        Self(CoreError::MediaServer(err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self(CoreError::Serialization(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::ScanAlreadyRunning
            | CoreError::AutoApplyAlreadyRunning
            | CoreError::InterruptedScanPending => StatusCode::CONFLICT,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidCron(_) | CoreError::InvalidInput(_) | CoreError::NotConfigured => {
                StatusCode::BAD_REQUEST
            }
            CoreError::MediaServer(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
