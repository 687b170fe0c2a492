use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use darkroom_images::ReferenceError;
use darkroom_replicate::ReplicateError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Route errors, rendered as `{ "error": "<message>" }`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields
    #[error("{0}")]
    BadRequest(String),

    /// Unknown resource
    #[error("{0}")]
    NotFound(String),

    /// Unusable image reference
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// Model call failure
    #[error(transparent)]
    Replicate(#[from] ReplicateError),

    /// Downloading a remote image failed
    #[error("{message}")]
    Fetch { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Reference(ReferenceError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest(_) | Self::Reference(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Replicate(error) => error.status_code(),
            Self::Fetch { status, .. } => *status,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %error, "request failed");
        } else {
            tracing::warn!(status = %status, error = %error, "request rejected");
        }

        (status, Json(ErrorBody { error })).into_response()
    }
}
