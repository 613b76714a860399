//! Multi-step authentication sessions.
//!
//! A session is one instance of the login flow, moving through
//! `AwaitingOtp` → `OtpVerified` → `Authenticated` and never backward:
//! - unguessable session id and per-session CSRF token
//! - one-time code with a bounded retry count
//! - absolute expiry from creation, collected by a periodic sweep
//! - pluggable step-up gate before the terminal step
//! - signed bearer token issued on completion
//!
//! ## Example
//!
//! ```no_run
//! use threegate::session::{SessionConfig, SessionManager};
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::new(
//!         SessionConfig::default(),
//!         "jwt-signing-secret-of-sufficient-len",
//!     );
//!
//!     let now = Utc::now();
//!     let session = manager.start("alice", "10.0.0.1", now).await?;
//!     manager.verify_otp(&session.session_id, &session.otp, now).await?;
//!     let token = manager.complete_step(&session.session_id, "", now).await?;
//!     println!("bearer token: {token}");
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{SessionError, SessionResult};
pub use manager::{AcceptAll, SessionConfig, SessionManager, StepUpVerifier};
pub use models::{AuthStep, Session};
