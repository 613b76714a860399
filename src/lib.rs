//! # Threegate
//!
//! The security core of a task-scheduler backend: a multi-step login flow,
//! session lifecycle, per-account lockout, and adaptive per-source rate
//! limiting, all safe under concurrently executing request handlers.
//!
//! ## Architecture
//!
//! Each request passes through independent components, each owning one
//! shared, sharded table:
//!
//! - **Admission limiter**: bounds in-flight operations; over the bound,
//!   requests are refused rather than queued
//! - **Rate Limiter**: fixed-window counting per source address, with
//!   progressively longer blocks for repeat offenders
//! - **Credential Store**: user records and peppered Argon2id password
//!   hashing
//! - **Lockout Policy**: temporary per-account locks after repeated
//!   credential failures, orthogonal to rate limiting
//! - **Session Manager**: the `AwaitingOtp` → `OtpVerified` →
//!   `Authenticated` state machine, with CSRF tokens, bounded OTP retries,
//!   absolute expiry, and signed bearer tokens
//!
//! The [`auth::AuthGateway`] composes them into the operations an HTTP
//! layer calls with already-parsed fields; every failure maps to a status
//! code and client-safe message.
//!
//! ## Core Modules
//!
//! - [`auth`]: Gateway operations, error taxonomy, admission limiting
//! - [`session`]: Session state machine and step-up verification seam
//! - [`credentials`]: Registration, validation, password verification
//! - [`security`]: Rate limiter, random identifiers, bearer tokens
//! - [`lockout`]: Failed-attempt counters and account locks
//! - [`store`]: Sharded in-memory record tables behind the storage seam
//!
//! ## Example
//!
//! ```
//! use threegate::{AuthGateway, GateConfig};
//!
//! // Reference configuration with development secrets
//! let gate = AuthGateway::new(GateConfig::default());
//! ```

/// Request-facing gateway composing every component.
pub mod auth;

/// Time source abstraction; components take `now` as an argument.
pub mod clock;

/// Environment-driven configuration.
pub mod config;

/// User records, input validation, and password hashing.
pub mod credentials;

/// Per-account lockout policy.
pub mod lockout;

/// Rate limiting and secret material.
pub mod security;

/// The multi-step session state machine.
pub mod session;

/// Record tables shared by concurrent workers.
pub mod store;

pub use auth::{AuthGateway, GateError, GateResult};
pub use config::GateConfig;
pub use credentials::RegisterRequest;
pub use session::AuthStep;
