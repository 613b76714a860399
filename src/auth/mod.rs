//! Auth gateway: the operations a transport layer calls.
//!
//! The gateway composes the crate's components into the request-shaped
//! surface of the login flow:
//! - registration and the three login steps, plus OTP resend and logout
//! - admission limiting and per-address rate limiting in front of
//!   everything
//! - account lockout fed by step-1 failures
//! - source-address binding and CSRF checks on session-bearing requests
//! - a periodic sweep collecting expired sessions
//!
//! ## Example
//!
//! ```no_run
//! use threegate::auth::AuthGateway;
//! use threegate::config::GateConfig;
//! use threegate::credentials::RegisterRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gate = AuthGateway::new(GateConfig::from_env()?);
//!     gate.run_expiry_sweeper(std::time::Duration::from_secs(60));
//!
//!     let request = RegisterRequest {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         secondary_contact: "+15550100".to_string(),
//!         password: "SecurePass123!".to_string(),
//!     };
//!     gate.register(request, "10.0.0.1").await?;
//!
//!     let step1 = gate.login_step1("alice", "SecurePass123!", "10.0.0.1").await?;
//!     let step2 = gate.login_step2(&step1.session_id, &step1.otp, "10.0.0.1").await?;
//!     let step3 = gate.login_step3(&step1.session_id, "", "10.0.0.1").await?;
//!     println!("{} -> {}", step2.current_step, step3.current_step);
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod errors;
pub mod manager;
pub mod models;

pub use admission::{AdmissionLimiter, AdmissionPermit};
pub use errors::{GateError, GateResult};
pub use manager::AuthGateway;
pub use models::{ResentOtp, StepOneResponse, StepThreeResponse, StepTwoResponse};
