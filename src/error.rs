use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// Id absent, time-expired, or view-exhausted; the caller cannot tell
    /// which.
    #[error("paste not found")]
    NotFound,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("backing store error")]
    Store {
        #[from]
        source: redis::RedisError,
    },
    #[error("malformed stored record")]
    Encoding {
        #[from]
        source: serde_json::Error,
    },
    #[error("conflicting concurrent update")]
    Conflict,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Store { .. } | ApiError::Encoding { .. } | ApiError::Conflict => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // 5xx bodies stay generic; the detail goes to the log only.
        let message = if status_code.is_server_error() {
            error!("internal error: {self:?}");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
