//! Session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the multi-step login flow.
///
/// The derived ordering matches flow order, so "never moves backward" is
/// checkable with `<=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    /// Credentials accepted, waiting for the one-time code
    AwaitingOtp,
    /// One-time code accepted, waiting for the final step
    OtpVerified,
    /// Fully authenticated (terminal)
    Authenticated,
}

impl AuthStep {
    /// Whether the flow can advance no further.
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthStep::Authenticated)
    }
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStep::AwaitingOtp => "awaiting_otp",
            AuthStep::OtpVerified => "otp_verified",
            AuthStep::Authenticated => "authenticated",
        };
        write!(f, "{name}")
    }
}

/// One instance of the login flow.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    pub current_step: AuthStep,
    pub otp: String,
    pub otp_attempts: u32,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source_address: String,
    pub is_active: bool,
}

impl Session {
    /// Whether the session is usable at `now`: active and unexpired.
    ///
    /// Expiry is absolute from creation; nothing refreshes it.
    pub fn is_alive(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}
