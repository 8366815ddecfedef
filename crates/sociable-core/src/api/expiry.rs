//! Expiry detector: decides whether a failed response means "token expired".
//!
//! The match is exact on purpose. The backend signals expiry with a 403 and
//! a fixed message; any other 403 (a real permission error) must not cause
//! a refresh. If the backend ever changes the wording, refresh silently
//! stops happening and requests fail with `ApiError::Http` instead.

use reqwest::StatusCode;

use super::error::ErrorBody;
use super::ApiResponse;

/// Status the backend uses for expired tokens.
pub const EXPIRED_TOKEN_STATUS: StatusCode = StatusCode::FORBIDDEN;

/// Message body the backend sends with an expired token.
pub const EXPIRED_TOKEN_MESSAGE: &str = "Invalid or expired token.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ExpiredToken,
    OtherFailure,
}

/// Classify a failed response.
pub fn classify(response: &ApiResponse) -> Classification {
    if response.status != EXPIRED_TOKEN_STATUS {
        return Classification::OtherFailure;
    }
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(ErrorBody {
            message: Some(message),
        }) if message == EXPIRED_TOKEN_MESSAGE => Classification::ExpiredToken,
        _ => Classification::OtherFailure,
    }
}

pub fn is_expired_token(response: &ApiResponse) -> bool {
    classify(response) == Classification::ExpiredToken
}
