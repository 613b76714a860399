//! Session error types.

use thiserror::Error;

use crate::store::StoreError;

/// Session state machine errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session unknown, inactive, or expired
    #[error("Invalid session")]
    InvalidSession,

    /// Operation not valid at the session's current step
    #[error("Invalid step")]
    WrongStep,

    /// One-time code did not match
    #[error("Invalid OTP")]
    InvalidOtp,

    /// Too many wrong one-time codes; the session was invalidated
    #[error("Too many OTP attempts")]
    OtpAttemptsExhausted,

    /// CSRF token missing or mismatched on a mutating request
    #[error("Invalid CSRF token")]
    InvalidCsrf,

    /// Step-up verifier rejected the supplied evidence
    #[error("Step-up verification failed")]
    StepUpRejected,

    /// Bearer token signing or verification failed
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Record store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Get a client-safe error message that doesn't leak which check failed
    ///
    /// Session and step failures share one message, OTP failures another, so
    /// a caller cannot probe session existence or state from responses.
    pub fn client_message(&self) -> &'static str {
        match self {
            SessionError::InvalidSession | SessionError::WrongStep => "Invalid session or step",
            SessionError::InvalidOtp | SessionError::OtpAttemptsExhausted => "Invalid OTP",
            SessionError::InvalidCsrf => "Invalid CSRF token",
            SessionError::StepUpRejected => "Verification failed",
            SessionError::Jwt(_) | SessionError::Store(_) => "Internal server error",
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
