use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a session ended without the caller asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The refresh endpoint answered with a non-2xx status.
    RefreshRejected(StatusCode),
    /// The refresh call never got a response.
    RefreshUnavailable,
    /// The refresh endpoint answered 2xx without a usable token.
    MalformedRefreshResponse,
    /// No refresh credential was stored, so no refresh was attempted.
    NoRefreshToken,
    /// The refresh task died before producing an outcome.
    RefreshAborted,
    /// A request that was already replayed once came back expired again.
    RetryLoopGuard,
    /// The session ended or was replaced while the refresh was in flight;
    /// the refreshed token was discarded.
    SessionReplaced,
    /// The user logged out.
    LoggedOut,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshRejected(status) => write!(f, "refresh rejected with {}", status),
            Self::RefreshUnavailable => f.write_str("refresh endpoint unreachable"),
            Self::MalformedRefreshResponse => f.write_str("refresh response carried no token"),
            Self::NoRefreshToken => f.write_str("no refresh token stored"),
            Self::RefreshAborted => f.write_str("refresh task aborted"),
            Self::RetryLoopGuard => f.write_str("replayed request expired again"),
            Self::SessionReplaced => f.write_str("session ended during refresh"),
            Self::LoggedOut => f.write_str("logged out"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Request failed with {status}: {}", detail(.message, .body))]
    Http {
        status: StatusCode,
        message: Option<String>,
        body: String,
    },

    #[error("Session expired. Please log in again. ({0})")]
    SessionExpired(SessionEndReason),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Token storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(Box::new(err))
    }
}

fn detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build the error surfaced for a non-2xx response that is not a token expiry.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message);
        ApiError::Http {
            status,
            message,
            body: Self::truncate_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

/// Error body shape returned by the backend: `{ "message": "..." }`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
