use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::matcher::MatchError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Per-request failures. None of these affect the index or other requests.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("No image uploaded")]
    NoImage,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: max {0}MB allowed")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NoImage | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Match(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ServerError::Match(MatchError::Extraction(e)) => {
                log::error!("Feature extraction failed: {e:#}");
                json!({ "error": "Feature extraction failed" })
            }
            ServerError::Match(_) | ServerError::Internal(_) => {
                log::error!("Request failed: {self}");
                json!({ "error": "An error occurred", "details": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(format!("{err:#}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}
