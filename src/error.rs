// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::store::DirectoryError;

/// Terminal errors produced by the request pipeline and its handlers.
///
/// Every variant renders to the same envelope:
/// `{ "ok": false, "code": <int>, "message": <string>, "errors"?: [<string>] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthHeaderMissing,
    TokenInvalid,
    TokenExpired,
    PrincipalNotFound,
    AuthenticationRequired,
    InvalidCredentials,

    // 403 Forbidden
    AuthorizationDenied(String),
    ScopeResolutionFailed(String),

    // 404 Not Found
    NotFound(String),

    // 429 Too Many Requests
    RateLimitExceeded { retry_after_secs: u64 },

    // 500 Internal Server Error
    StageExecutionFailure(String),
    StageNotFound(String),
    UnexpectedFailure,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::AuthHeaderMissing
            | ApiError::TokenInvalid
            | ApiError::TokenExpired
            | ApiError::PrincipalNotFound
            | ApiError::AuthenticationRequired
            | ApiError::InvalidCredentials => 401,
            ApiError::AuthorizationDenied(_) | ApiError::ScopeResolutionFailed(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::RateLimitExceeded { .. } => 429,
            ApiError::StageExecutionFailure(_)
            | ApiError::StageNotFound(_)
            | ApiError::UnexpectedFailure => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::AuthHeaderMissing => {
                "Authorization header with Bearer token required".to_string()
            }
            // Expiry is not disclosed separately to the caller
            ApiError::TokenInvalid | ApiError::TokenExpired => "Invalid token".to_string(),
            ApiError::PrincipalNotFound => "User not found".to_string(),
            ApiError::AuthenticationRequired => "Authentication required".to_string(),
            ApiError::InvalidCredentials => "Invalid credentials".to_string(),
            ApiError::AuthorizationDenied(msg) => msg.clone(),
            ApiError::ScopeResolutionFailed(msg) => msg.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::RateLimitExceeded { .. } => "Too Many Requests".to_string(),
            ApiError::StageExecutionFailure(msg) => format!("execution failed: {}", msg),
            ApiError::StageNotFound(name) => format!("function not found on function {}", name),
            ApiError::UnexpectedFailure => "Unexpected Failure".to_string(),
        }
    }

    /// Detail lines for the `errors` field of the envelope
    pub fn details(&self) -> Vec<String> {
        match self {
            ApiError::RateLimitExceeded { retry_after_secs } => vec![format!(
                "Rate limit exceeded. Try again in {} seconds",
                retry_after_secs
            )],
            _ => Vec::new(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "ok": false,
            "code": self.status_code(),
            "message": self.message(),
        });

        let details = self.details();
        if !details.is_empty() {
            response["errors"] = json!(details);
        }

        response
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        ApiError::AuthorizationDenied(format!("Unauthorized - {}", reason.into()))
    }

    pub fn scope_unresolved(reason: impl Into<String>) -> Self {
        ApiError::ScopeResolutionFailed(format!("Unauthorized - {}", reason.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        ApiError::StageExecutionFailure(message.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// Failures of the backing stores (accounts, directory, rate counters)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl From<DirectoryError> for ApiError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::UnknownSchool(_) | DirectoryError::UnknownClassroom(_) => {
                ApiError::not_found(error.to_string())
            }
            DirectoryError::SchoolMismatch { .. }
            | DirectoryError::MissingPlacement
            | DirectoryError::MissingSchool
            | DirectoryError::DuplicateAccount => ApiError::bad_request(error.to_string()),
            DirectoryError::SuperadminExists => ApiError::denied(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_uniform() {
        let body = ApiError::AuthHeaderMissing.to_json();
        assert_eq!(
            body,
            json!({
                "ok": false,
                "code": 401,
                "message": "Authorization header with Bearer token required"
            })
        );
    }

    #[test]
    fn rate_limit_envelope_carries_hint() {
        let body = ApiError::RateLimitExceeded { retry_after_secs: 42 }.to_json();
        assert_eq!(body["code"], 429);
        assert_eq!(body["message"], "Too Many Requests");
        assert_eq!(body["errors"][0], "Rate limit exceeded. Try again in 42 seconds");
    }

    #[test]
    fn denials_share_prefix() {
        assert_eq!(ApiError::denied("nope").message(), "Unauthorized - nope");
        assert_eq!(ApiError::scope_unresolved("gone").status_code(), 403);
    }
}
