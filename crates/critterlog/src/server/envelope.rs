//! The JSON envelope every API response is wrapped in.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorKind};

/// Outcome class reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The action completed.
    Success,
    /// The action failed.
    Error,
    /// The caller must log in (or supplied a wrong confirmation secret).
    Unauthorized,
}

/// `{status, message?, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Outcome class.
    pub status: Status,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload, for actions that return data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// A success envelope carrying only a message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    /// A success envelope carrying a payload.
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }

    /// The failure envelope for an error.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        let status = match err.kind() {
            ErrorKind::Unauthorized => Status::Unauthorized,
            _ => Status::Error,
        };
        Self {
            status,
            message: Some(err.client_message()),
            data: None,
        }
    }
}

/// HTTP status code accompanying an error envelope.
#[must_use]
pub fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::IoFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
