//! Security primitives: rate limiting and secret material.
//!
//! This module provides the identity-independent half of the crate's
//! defenses:
//! - Fixed-window rate limiting per source address with progressive
//!   penalties for repeat violations
//! - Generation of session identifiers, CSRF tokens, and one-time codes
//!   from the process CSPRNG
//! - Bearer-token issuance and verification for authenticated sessions
//! - Constant-time comparison for secrets
//!
//! ## Rate Limiting
//!
//! Every inbound request is counted against its source address before any
//! credential or session state is touched. The reference budget is 100
//! requests per 60-second window; a violation blocks the address for
//! 300 seconds times the number of violations seen so far.
//!
//! ## Example
//!
//! ```
//! use threegate::security::{RateLimitConfig, RateLimiter};
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::new(RateLimitConfig::default());
//!
//!     let decision = limiter.admit("192.168.1.1", Utc::now()).await;
//!     if decision.is_allowed() {
//!         println!("admitted, {} requests left", decision.remaining().unwrap());
//!     }
//! }
//! ```

pub mod rate_limiter;
pub mod tokens;

pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use tokens::{
    BearerClaims, CSRF_TOKEN_LEN, SESSION_ID_LEN, TokenIssuer, constant_time_eq, csrf_token,
    numeric_code, session_id,
};
