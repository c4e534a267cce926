//! Error types for the session lifecycle.
//!
//! Every variant is internal detail: the session manager folds them into the
//! `login` result and the redirect flag, and keeps the kind for logging.

use std::time::Duration;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating or resolving an account.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend could not be reached or answered with a server failure.
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Email/password pair was rejected.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// The account exists but its email address is not confirmed yet.
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// The backend is throttling sign-in attempts.
    #[error("Too many requests, try again later")]
    RateLimited,

    /// An authenticated principal has no application-level user record.
    #[error("No user record for {email}")]
    NoUserRecord { email: String },

    /// The user record carries a role this portal does not know.
    #[error("Unrecognized role '{0}'")]
    NoRoleMatch(String),

    /// An operation did not finish within its time budget.
    #[error("{operation} timed out after {}s", budget.as_secs())]
    OperationTimedOut {
        operation: &'static str,
        budget: Duration,
    },

    /// The backend rejected a request for another reason.
    #[error("Backend error ({code}): {message}")]
    Backend { code: String, message: String },

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl AuthError {
    /// Map a sign-in failure message from the auth service to an error kind.
    pub fn from_auth_message(message: &str) -> Self {
        match message {
            "Invalid login credentials" => AuthError::InvalidCredentials,
            "Email not confirmed" => AuthError::EmailNotConfirmed,
            "Too many requests" => AuthError::RateLimited,
            other => AuthError::Backend {
                code: "AUTH_ERROR".to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Map a row-store error code to an error kind.
    pub fn from_row_store(code: &str, message: &str) -> Self {
        let code = match code {
            "PGRST116" => "NOT_FOUND",
            "23505" => "DUPLICATE",
            "23503" => "FOREIGN_KEY",
            "42501" => "PERMISSION_DENIED",
            _ => "DATABASE_ERROR",
        };
        AuthError::Backend {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &str {
        match self {
            AuthError::BackendUnreachable(_) => "BACKEND_UNREACHABLE",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailNotConfirmed => "EMAIL_NOT_CONFIRMED",
            AuthError::RateLimited => "TOO_MANY_REQUESTS",
            AuthError::NoUserRecord { .. } => "NO_USER_RECORD",
            AuthError::NoRoleMatch(_) => "NO_ROLE_MATCH",
            AuthError::OperationTimedOut { .. } => "TIMED_OUT",
            AuthError::Backend { code, .. } => code,
            AuthError::Storage(_) => "STORAGE_ERROR",
            AuthError::Serialization(_) => "SERIALIZATION_ERROR",
            AuthError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the failure means the backend did not answer in time.
    ///
    /// Unreachable and timed-out operations share one degraded outcome.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            AuthError::BackendUnreachable(_) | AuthError::OperationTimedOut { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            AuthError::BackendUnreachable(e.to_string())
        } else if e.is_decode() {
            AuthError::Serialization(e.to_string())
        } else {
            AuthError::Backend {
                code: "HTTP_ERROR".to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(e: url::ParseError) -> Self {
        AuthError::Config(format!("Invalid URL: {}", e))
    }
}
