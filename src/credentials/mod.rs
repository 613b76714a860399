//! User registration and password verification.
//!
//! This module owns the user table and everything password-shaped:
//! - Argon2id password hashing with a server-side pepper
//! - Input validation for usernames, emails, contacts, and passwords
//! - Atomic username/email uniqueness at registration
//! - Soft deactivation so records outlive their active life
//!
//! ## Example
//!
//! ```no_run
//! use threegate::credentials::{CredentialStore, PasswordPolicy, RegisterRequest};
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CredentialStore::new(
//!         "secret_pepper".to_string(),
//!         PasswordPolicy::default(),
//!         10_000,
//!     );
//!
//!     let request = RegisterRequest {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         secondary_contact: "+15550100".to_string(),
//!         password: "SecurePass123!".to_string(),
//!     };
//!
//!     let user_id = store.register(request, Utc::now()).await?;
//!     println!("registered {user_id}");
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod models;
pub mod store;

pub use errors::{CredentialError, CredentialResult};
pub use models::{PasswordPolicy, RegisterRequest, User};
pub use store::CredentialStore;
