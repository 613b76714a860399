//! Gate operation payloads.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::AuthStep;

/// Login step 1 success payload.
///
/// Carries the one-time code for the caller to deliver out-of-band; the
/// gate itself sends no mail or SMS.
#[derive(Debug, Clone, Serialize)]
pub struct StepOneResponse {
    pub session_id: String,
    pub csrf_token: String,
    pub otp: String,
    pub current_step: AuthStep,
    pub expires_at: DateTime<Utc>,
}

/// Login step 2 success payload
#[derive(Debug, Clone, Serialize)]
pub struct StepTwoResponse {
    pub current_step: AuthStep,
}

/// Login step 3 success payload
#[derive(Debug, Clone, Serialize)]
pub struct StepThreeResponse {
    pub access_token: String,
    pub current_step: AuthStep,
}

/// OTP resend success payload
#[derive(Debug, Clone, Serialize)]
pub struct ResentOtp {
    pub otp: String,
}
