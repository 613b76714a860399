//! Gate error taxonomy.
//!
//! Every gate operation returns either its success payload or a [`GateError`]
//! that a transport layer maps straight to a status code and JSON body. The
//! variants deliberately collapse internal detail: a caller learns whether it
//! was rejected, not which internal check rejected it.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::session::SessionError;
use crate::store::StoreError;

/// Gate operation errors
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed or missing input; detected before any state mutation
    #[error("{0}")]
    Validation(String),

    /// Username or email already registered
    #[error("Username or email already exists")]
    AlreadyRegistered,

    /// Credential check failed; covers unknown user and wrong password alike
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Session unknown, expired, inactive, or at the wrong step
    #[error("Invalid session or step")]
    InvalidSession,

    /// One-time code rejected
    #[error("Invalid OTP")]
    InvalidOtp,

    /// CSRF token missing or mismatched on a mutating request
    #[error("Invalid CSRF token")]
    CsrfRejected,

    /// Step-up verification refused the supplied evidence
    #[error("Verification failed")]
    StepUpRejected,

    /// Account temporarily locked after repeated credential failures
    #[error("Account temporarily locked")]
    AccountLocked { retry_after: i64 },

    /// Source address exceeded the request ceiling
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: i64 },

    /// A backing table is full or the server refuses new work
    #[error("Server at capacity, try again later")]
    AtCapacity,

    /// Unexpected internal failure; the only class logged as an error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// HTTP-style status code for a transport layer to map directly.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::Validation(_) => 400,
            GateError::AlreadyRegistered => 409,
            GateError::InvalidCredentials
            | GateError::InvalidSession
            | GateError::InvalidOtp
            | GateError::StepUpRejected => 401,
            GateError::CsrfRejected => 403,
            GateError::AccountLocked { .. } => 423,
            GateError::RateLimited { .. } => 429,
            GateError::AtCapacity => 503,
            GateError::Internal(_) => 500,
        }
    }

    /// Get a client-safe error message that doesn't leak internal detail.
    pub fn client_message(&self) -> String {
        match self {
            GateError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Seconds after which the caller may retry, for lock and rate-limit
    /// rejections.
    pub fn retry_after(&self) -> Option<i64> {
        match self {
            GateError::AccountLocked { retry_after } | GateError::RateLimited { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// JSON error body for a transport layer, paired with
    /// [`Self::status_code`].
    pub fn error_body(&self) -> serde_json::Value {
        match self.retry_after() {
            Some(retry_after) => serde_json::json!({
                "error": self.client_message(),
                "retry_after": retry_after,
            }),
            None => serde_json::json!({ "error": self.client_message() }),
        }
    }
}

impl From<CredentialError> for GateError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidUsername(msg)
            | CredentialError::InvalidEmail(msg)
            | CredentialError::InvalidContact(msg)
            | CredentialError::WeakPassword(msg) => GateError::Validation(msg),
            CredentialError::AlreadyRegistered | CredentialError::Store(StoreError::Duplicate) => {
                GateError::AlreadyRegistered
            }
            CredentialError::UserNotFound | CredentialError::InvalidPassword => {
                GateError::InvalidCredentials
            }
            CredentialError::HashingFailed => {
                GateError::Internal("password hashing failed".to_string())
            }
            CredentialError::Store(other) => other.into(),
        }
    }
}

impl From<SessionError> for GateError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSession | SessionError::WrongStep => GateError::InvalidSession,
            SessionError::InvalidOtp | SessionError::OtpAttemptsExhausted => GateError::InvalidOtp,
            SessionError::InvalidCsrf => GateError::CsrfRejected,
            SessionError::StepUpRejected => GateError::StepUpRejected,
            SessionError::Jwt(err) => GateError::Internal(err.to_string()),
            SessionError::Store(other) => other.into(),
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Capacity { .. } => GateError::AtCapacity,
            // A key conflict outside registration means a random identifier
            // collided, which is not a client problem
            StoreError::Duplicate => GateError::Internal("unexpected duplicate record".to_string()),
        }
    }
}

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;
