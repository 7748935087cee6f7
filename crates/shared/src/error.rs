use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Internal,
}

impl ErrorCode {
    /// Maps an HTTP status onto the closest error code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            _ => Self::Internal,
        }
    }

    pub fn is_auth_failure(self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

/// Error body returned by the review backend on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an error from a raw response, preferring a structured body when the
    /// backend sent one.
    pub fn from_response(status: u16, body: &str) -> Self {
        serde_json::from_str::<ApiError>(body).unwrap_or_else(|_| {
            let message = if body.trim().is_empty() {
                format!("http status {status}")
            } else {
                body.trim().to_string()
            };
            Self::new(ErrorCode::from_status(status), message)
        })
    }
}
