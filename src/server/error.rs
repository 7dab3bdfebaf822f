use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::crawler::JobError;
use crate::exchange::ExchangeError;
use crate::server::dto::ErrorResponse;
use crate::store::StoreError;

/// Errors a route handler can answer with
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::UnknownSpider(_) => Self::NotFound(err.to_string()),
            JobError::AlreadyRunning(_) => Self::Conflict(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Malformed(_) => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let body = ErrorResponse {
            errors: vec![message],
        };

        (status, axum::Json(body)).into_response()
    }
}
