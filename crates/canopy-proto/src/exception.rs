//! Exception envelope shared by every error response.
//!
//! Errors travel as `{exception_type, exception_info}` with a small fixed
//! set of exception names, so that clients written against the Java-style
//! API keep working regardless of the server language.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of wire-visible exception types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionKind {
    /// Malformed argument, typically an invalid path
    #[serde(rename = "IllegalArgumentException")]
    IllegalArgument,
    /// Target or an ancestor does not exist, or is the wrong kind
    #[serde(rename = "FileNotFoundException")]
    FileNotFound,
    /// State conflict: duplicate registration, no registered replicas
    #[serde(rename = "IllegalStateException")]
    IllegalState,
    /// Out-of-range byte access, passed through from storage I/O
    #[serde(rename = "IndexOutOfBoundsException")]
    IndexOutOfBounds,
    /// Network or transport failure
    #[serde(rename = "IOException")]
    Io,
}

impl ExceptionKind {
    /// HTTP status code conventionally paired with this exception.
    pub fn status_code(&self) -> u16 {
        match self {
            ExceptionKind::IllegalArgument => 404,
            ExceptionKind::FileNotFound => 404,
            ExceptionKind::IllegalState => 409,
            ExceptionKind::IndexOutOfBounds => 404,
            ExceptionKind::Io => 500,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionKind::IllegalArgument => "IllegalArgumentException",
            ExceptionKind::FileNotFound => "FileNotFoundException",
            ExceptionKind::IllegalState => "IllegalStateException",
            ExceptionKind::IndexOutOfBounds => "IndexOutOfBoundsException",
            ExceptionKind::Io => "IOException",
        };
        write!(f, "{}", name)
    }
}

/// Wire body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionResponse {
    /// Exception type name
    pub exception_type: ExceptionKind,
    /// Human-readable detail
    pub exception_info: String,
}

impl ExceptionResponse {
    /// Creates an envelope for the given kind and detail message.
    pub fn new(kind: ExceptionKind, info: impl Into<String>) -> Self {
        Self {
            exception_type: kind,
            exception_info: info.into(),
        }
    }
}
