//! Error types for critterlog.
//!
//! This module defines all error types used throughout the critterlog crate.
//! Every error maps onto a small, client-facing [`ErrorKind`] so the API
//! dispatcher can turn any failure into a JSON envelope without leaking
//! internal details.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for critterlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    /// A required field was missing or malformed.
    #[error("{message}")]
    Validation {
        /// Human-readable description, shown to the client.
        message: String,
    },

    /// The caller is not authenticated, or a confirmation secret was wrong.
    #[error("{message}")]
    Unauthorized {
        /// Human-readable description, shown to the client.
        message: String,
    },

    /// The login password did not match.
    #[error("Invalid password.")]
    InvalidCredentials,

    /// No sighting matched the given key.
    #[error("no sighting recorded at '{key}'")]
    NotFound {
        /// The `created_at` key that was looked up.
        key: String,
    },

    /// Unknown action, or a known action with the wrong HTTP method.
    #[error("Invalid Request")]
    InvalidRequest,

    // === Storage Errors ===
    /// The data file could not be read.
    #[error("failed to read data file {path}: {source}")]
    StoreRead {
        /// Path to the data file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The data file could not be written.
    #[error("failed to write data file {path}: {source}")]
    StoreWrite {
        /// Path to the data file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The advisory lock guarding the data file could not be taken.
    #[error("failed to lock {path}: {source}")]
    StoreLock {
        /// Path to the lock file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for critterlog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed required fields (includes a bad login password).
    Validation,
    /// Missing or failed authentication.
    Unauthorized,
    /// Delete target absent.
    NotFound,
    /// Data file unreadable or unwritable.
    IoFailure,
    /// Unknown action or wrong HTTP method.
    InvalidRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::IoFailure => write!(f, "io_failure"),
            Self::InvalidRequest => write!(f, "invalid_request"),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error for the client.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidCredentials | Self::Json(_) => {
                ErrorKind::Validation
            }
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRequest => ErrorKind::InvalidRequest,
            Self::StoreRead { .. }
            | Self::StoreWrite { .. }
            | Self::StoreLock { .. }
            | Self::ConfigLoad(_)
            | Self::ConfigValidation { .. }
            | Self::Io(_)
            | Self::DirectoryCreate { .. }
            | Self::Internal(_) => ErrorKind::IoFailure,
        }
    }

    /// Message safe to show to an API client.
    ///
    /// Storage failures are collapsed into a generic message; the details
    /// belong in the server log.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::NotFound { .. } => "Sighting not found.".to_string(),
            Self::StoreRead { .. } => "Critical Server Error: Cannot read data file.".to_string(),
            Self::StoreWrite { .. } | Self::StoreLock { .. } | Self::DirectoryCreate { .. } => {
                "Critical Server Error: Cannot write to file.".to_string()
            }
            Self::Json(_) => "Malformed request body.".to_string(),
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::Io(_) | Self::Internal(_) => {
                "Critical Server Error.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Check if this error is an authentication failure.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Check if this error reports a missing delete target.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
