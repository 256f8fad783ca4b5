/// Unified error types for the ToolHub backend
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Business-rule failures the caller can fix; carries a stable code
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Missing or unresolvable credential
    #[error("not logged in")]
    Unauthenticated,

    /// Unknown resource, or a resource owned by a different account
    #[error("not found")]
    NotFound,

    /// Fixed-window limit hit
    #[error("rate limit exceeded")]
    RateLimited { retry_after: std::time::Duration },

    /// Non-pro daily quota for quote downloads exhausted
    #[error("daily download limit reached")]
    DailyLimitReached,

    /// Internal server errors
    #[error("internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-fixable validation failures with machine-readable codes,
/// so the UI can localize without string-matching messages.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email and password are required")]
    MissingFields,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password too weak: at least 8 characters with a letter and a digit")]
    WeakPassword,

    #[error("email already registered")]
    EmailExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("legacy account has no password set, request a password reset first")]
    LegacyAccount,

    #[error("reset token not found")]
    InvalidToken,

    #[error("reset token already used")]
    TokenUsed,

    #[error("reset token expired")]
    TokenExpired,

    #[error("too many line items")]
    TooManyItems,
}

impl ValidationError {
    /// Stable wire code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingFields => "MISSING_FIELDS",
            ValidationError::InvalidEmail => "INVALID_EMAIL",
            ValidationError::WeakPassword => "WEAK_PASSWORD",
            ValidationError::EmailExists => "EMAIL_EXISTS",
            ValidationError::InvalidCredentials => "INVALID_CREDENTIALS",
            ValidationError::LegacyAccount => "LEGACY_ACCOUNT",
            ValidationError::InvalidToken => "INVALID_TOKEN",
            ValidationError::TokenUsed => "TOKEN_USED",
            ValidationError::TokenExpired => "TOKEN_EXPIRED",
            ValidationError::TooManyItems => "TOO_MANY_ITEMS",
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Validation(v) => (StatusCode::BAD_REQUEST, v.code(), self.to_string()),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_LOGGED_IN",
                self.to_string(),
            ),
            // Ownership failures deliberately collapse into 404 so the
            // existence of another account's resources is not leaked.
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::RateLimited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                let body = Json(ErrorResponse {
                    ok: false,
                    error: "RATE_LIMITED".to_string(),
                    message: "Rate limit exceeded, retry later".to_string(),
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    body,
                )
                    .into_response();
            }
            ApiError::DailyLimitReached => (
                StatusCode::TOO_MANY_REQUESTS,
                "DAILY_LIMIT_REACHED",
                "Daily download limit reached for the Base plan, upgrade to Pro for unlimited downloads".to_string(),
            ),
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Io(_) => {
                tracing::error!("internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    // Don't leak details
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            ok: false,
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handler and service operations
pub type ApiResult<T> = Result<T, ApiError>;
