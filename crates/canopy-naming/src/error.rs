//! Mapping from gateway errors to the wire exception envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canopy_core::PathParseError;
use canopy_proto::{ExceptionKind, ExceptionResponse};
use thiserror::Error;

/// Detail message used by the original API for invalid paths.
const INVALID_PATH_INFO: &str = "the file/directory or parent directory is not a valid path.";
/// Detail message used by the original API for missing paths.
const NOT_FOUND_INFO: &str = "the file/directory or parent directory does not exist.";

/// A request-scoped gateway error, rendered as an exception envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Malformed argument, typically an invalid path (404 on the wire)
    #[error("{0}")]
    IllegalArgument(String),

    /// Missing target, ancestor, or wrong node kind (404)
    #[error("{0}")]
    NotFound(String),

    /// State conflict such as a duplicate registration (409)
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    /// An invalid-path error with the conventional detail message.
    pub fn invalid_path() -> Self {
        ApiError::IllegalArgument(INVALID_PATH_INFO.to_string())
    }

    /// A not-found error with the conventional detail message.
    pub fn not_found() -> Self {
        ApiError::NotFound(NOT_FOUND_INFO.to_string())
    }

    /// A not-found condition reported as an illegal argument; `/unlock`
    /// uses this for paths that do not resolve.
    pub fn not_found_as_argument() -> Self {
        ApiError::IllegalArgument(NOT_FOUND_INFO.to_string())
    }

    fn kind(&self) -> ExceptionKind {
        match self {
            ApiError::IllegalArgument(_) => ExceptionKind::IllegalArgument,
            ApiError::NotFound(_) => ExceptionKind::FileNotFound,
            ApiError::Conflict(_) => ExceptionKind::IllegalState,
        }
    }
}

impl From<PathParseError> for ApiError {
    fn from(_: PathParseError) -> Self {
        ApiError::invalid_path()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = StatusCode::from_u16(kind.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ExceptionResponse::new(kind, self.to_string()))).into_response()
    }
}
