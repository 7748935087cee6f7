use shared::error::ApiError;
use thiserror::Error;

/// Failures reported by a [`ReviewSource`](crate::ReviewSource).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("review backend rejected the session token")]
    Unauthorized,
    #[error("review backend unreachable: {0}")]
    Transport(String),
    #[error("review backend returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response from review backend: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn from_api(status: u16, error: ApiError) -> Self {
        if error.code.is_auth_failure() || status == 401 || status == 403 {
            Self::Unauthorized
        } else {
            Self::Status {
                status,
                message: error.message,
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Status {
                status: status.as_u16(),
                message: value.to_string(),
            }
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Conditions the session controller reports without changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// Empty or whitespace-only submission.
    ValidationSkip,
    /// The deck is empty.
    NoCurrentItem,
    /// A deferred effect outlived the batch or transition that scheduled it.
    StaleEffect {
        effect_generation: u64,
        current_generation: u64,
    },
    /// A submission arrived while feedback for the previous one is still showing.
    FeedbackPending,
    /// Undo requested with the undo window closed.
    UndoUnavailable,
    /// "Learn more" found nothing new yet; repeat the request later.
    NothingNew,
}

#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    #[error("remote failure: {0}")]
    Remote(#[source] SourceError),
    #[error("session token expired; sign in again")]
    AuthExpired,
    #[error("sign-in rejected by review backend")]
    LoginRejected,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("{operation} is not available while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },
}

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
