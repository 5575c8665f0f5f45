//! Error types for the model registry and catalog.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse category of an [`Error`], used by boundary layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; the caller can fix it.
    Validation,
    /// Unknown id.
    NotFound,
    /// Authenticated but not authorized.
    Forbidden,
    /// Duplicate primary key on create.
    Conflict,
    /// Remote provider errored or could not be reached.
    Upstream,
    /// Backing store failure.
    Storage,
}

/// Errors that can occur during registry and catalog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller lacks the required permission.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// A record with the same id already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// Remote provider returned a non-success status or the call failed.
    ///
    /// `status` is `None` for network-level failures (connect, timeout,
    /// undecodable body, cancellation).
    #[error("upstream provider error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl Error {
    /// Upstream error carrying the provider's HTTP status.
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Upstream error for a call that never produced a usable response.
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Error returned when the enclosing request was cancelled.
    pub fn cancelled() -> Self {
        Self::gateway("request cancelled")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Upstream { .. } => ErrorKind::Upstream,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// HTTP status a serving layer should answer with.
    ///
    /// Upstream errors forward the provider's status when one was received
    /// and fall back to 502 Bad Gateway otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::Forbidden(_) => 403,
            Error::Conflict(_) => 409,
            Error::Upstream {
                status: Some(status),
                ..
            } => *status,
            Error::Upstream { status: None, .. } => 502,
            Error::Storage(_) => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else if err.is_decode() {
            format!("unexpected response body: {err}")
        } else {
            err.to_string()
        };
        Error::gateway(message)
    }
}
