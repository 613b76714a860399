//! Credential store error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Password verification failed
    #[error("Invalid password")]
    InvalidPassword,

    /// No active user under that username
    #[error("User not found")]
    UserNotFound,

    /// Username or email already registered
    #[error("Username or email already exists")]
    AlreadyRegistered,

    /// Invalid username format
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Invalid email format
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Invalid secondary contact
    #[error("Invalid contact: {0}")]
    InvalidContact(String),

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    /// Backing table failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CredentialError {
    /// Get a client-safe error message that doesn't leak which check failed
    ///
    /// Lookup and verification failures collapse into one uniform message so
    /// a caller cannot probe which usernames exist.
    pub fn client_message(&self) -> String {
        match self {
            CredentialError::UserNotFound | CredentialError::InvalidPassword => {
                "Invalid credentials".to_string()
            }
            CredentialError::HashingFailed | CredentialError::Store(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}
