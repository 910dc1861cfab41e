// Error types for the remote API, the session layer and the HTTP surface.
// AppError converts everything into consistent responses for axum.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::enquiry::{EnquiryError, ValidationErrors};

/// Failures talking to the listing API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid response payload: {0}")]
    Decode(String),

    #[error("invalid path segment: {0}")]
    InvalidPath(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Conflict(_) => Some(409),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::InvalidPath(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("token refresh failed after {attempts} attempts")]
    RefreshExhausted { attempts: u32 },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// Application error surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal error: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("upstream error: {0}")]
    Upstream(#[from] ApiError),
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotLoggedIn => AppError::Unauthorized("Login required".into()),
            SessionError::LoginRejected(message) => AppError::Unauthorized(message),
            SessionError::Api(e) => AppError::Upstream(e),
            other => AppError::InternalServerError(anyhow::Error::new(other)),
        }
    }
}

impl From<EnquiryError> for AppError {
    fn from(error: EnquiryError) -> Self {
        match error {
            EnquiryError::Invalid(errors) => AppError::Validation(errors),
            EnquiryError::Api(e) => AppError::Upstream(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        AppError::InternalServerError(anyhow::Error::new(error))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Internal Server Error" }),
                )
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized request: {}", message);
                (
                    StatusCode::UNAUTHORIZED,
                    json!({ "success": false, "error": message }),
                )
            }
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": format!("{} not found", what) }),
            ),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "success": false, "error": "Validation failed", "fields": errors }),
            ),
            AppError::Upstream(e) => {
                tracing::error!("Upstream API error: {}", e);
                let status = match &e {
                    ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    ApiError::Conflict(_) => StatusCode::CONFLICT,
                    ApiError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, json!({ "success": false, "error": e.to_string() }))
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
