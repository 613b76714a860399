//! User records and password verification.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{CredentialError, CredentialResult};
use super::models::{PasswordPolicy, RegisterRequest, User};
use crate::store::{MemoryTable, StoreError};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 50;
const EMAIL_MIN_LEN: usize = 5;
const EMAIL_MAX_LEN: usize = 254;
const CONTACT_MAX_LEN: usize = 32;

/// Owns user records: registration, lookup, and password verification.
///
/// Passwords are hashed with Argon2id over the password plus a server-side
/// pepper, each under a fresh random salt. Verification recomputes the hash
/// and compares inside the Argon2 primitive, which is constant-time.
pub struct CredentialStore {
    users: MemoryTable<String, User>,
    pepper: String,
    policy: PasswordPolicy,
}

impl CredentialStore {
    /// Create a credential store.
    ///
    /// # Arguments
    ///
    /// * `pepper` - Server-side secret appended to every password before
    ///   hashing
    /// * `policy` - Password strength policy
    /// * `max_users` - Bound on stored user records
    pub fn new(pepper: String, policy: PasswordPolicy, max_users: usize) -> Self {
        Self {
            users: MemoryTable::bounded(max_users),
            pepper,
            policy,
        }
    }

    /// Register a new user.
    ///
    /// Input is validated before any shared state is touched; the
    /// username/email uniqueness check and the insert then run as one
    /// atomic step.
    ///
    /// # Arguments
    ///
    /// * `request` - Registration fields
    /// * `now` - Current instant, recorded as the creation time
    ///
    /// # Returns
    ///
    /// * `CredentialResult<Uuid>` - The new user's id
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed fields or a weak password,
    /// [`CredentialError::AlreadyRegistered`] if the username or email is
    /// taken, and a store error if the user table is full.
    pub async fn register(
        &self,
        request: RegisterRequest,
        now: DateTime<Utc>,
    ) -> CredentialResult<Uuid> {
        Self::validate_username(&request.username)?;
        Self::validate_email(&request.email)?;
        Self::validate_contact(&request.secondary_contact)?;
        self.validate_password(&request.password)?;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self.hash_password(&request.password, &salt)?;

        let user = User {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            secondary_contact: request.secondary_contact,
            password_hash,
            password_salt: salt.as_str().to_string(),
            created_at: now,
            is_active: true,
        };
        let user_id = user.id;
        let email = request.email;

        self.users
            .insert_unique(request.username.clone(), user, |existing| {
                existing.email == email
            })
            .await
            .map_err(|err| match err {
                StoreError::Duplicate => CredentialError::AlreadyRegistered,
                other => CredentialError::Store(other),
            })?;

        log::info!("registered user {}", request.username);
        Ok(user_id)
    }

    /// Look up an active user by username. Case-sensitive, matching
    /// registration.
    pub async fn find_active(&self, username: &str) -> Option<User> {
        self.users
            .get(&username.to_string())
            .await
            .filter(|user| user.is_active)
    }

    /// Verify a username/password pair, returning the user on success.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::UserNotFound`] for an unknown or inactive
    /// username and [`CredentialError::InvalidPassword`] for a wrong
    /// password. Callers that face the outside collapse both into one
    /// uniform message via `client_message`.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> CredentialResult<User> {
        let user = self
            .find_active(username)
            .await
            .ok_or(CredentialError::UserNotFound)?;
        self.verify_password(password, &user.password_hash)?;
        Ok(user)
    }

    /// Verify `password` against a stored hash.
    pub fn verify_password(&self, password: &str, hash: &str) -> CredentialResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| CredentialError::InvalidPassword)?;

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| CredentialError::InvalidPassword)
    }

    /// Change a user's password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns the verification error if `current` is wrong, or a weak
    /// password error if `new` fails the policy.
    pub async fn change_password(
        &self,
        username: &str,
        current: &str,
        new: &str,
    ) -> CredentialResult<()> {
        let user = self
            .find_active(username)
            .await
            .ok_or(CredentialError::UserNotFound)?;
        self.verify_password(current, &user.password_hash)?;
        self.validate_password(new)?;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self.hash_password(new, &salt)?;
        let password_salt = salt.as_str().to_string();

        self.users
            .update(&username.to_string(), |user| {
                user.password_hash = password_hash;
                user.password_salt = password_salt;
            })
            .await
            .ok_or(CredentialError::UserNotFound)?;

        log::info!("password changed for {username}");
        Ok(())
    }

    /// Soft-deactivate a user; the record stays but no longer matches
    /// lookups or credential checks.
    pub async fn deactivate(&self, username: &str) -> CredentialResult<()> {
        self.users
            .update(&username.to_string(), |user| user.is_active = false)
            .await
            .ok_or(CredentialError::UserNotFound)
    }

    /// Number of stored user records, active or not.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Hash a peppered password under `salt`.
    fn hash_password(&self, password: &str, salt: &SaltString) -> CredentialResult<String> {
        let peppered = format!("{}{}", password, self.pepper);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), salt)
            .map_err(|_| CredentialError::HashingFailed)?
            .to_string())
    }

    /// Validate username format
    fn validate_username(username: &str) -> CredentialResult<()> {
        let len = username.len();
        if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
            return Err(CredentialError::InvalidUsername(
                "Username must be 3-50 characters".to_string(),
            ));
        }

        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CredentialError::InvalidUsername(
                "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate email shape: one @ with a non-empty local part and a dotted
    /// domain. Full RFC parsing belongs to the mail layer, not here.
    fn validate_email(email: &str) -> CredentialResult<()> {
        let len = email.len();
        if len < EMAIL_MIN_LEN || len > EMAIL_MAX_LEN {
            return Err(CredentialError::InvalidEmail(
                "Email must be 5-254 characters".to_string(),
            ));
        }

        if email.chars().any(|c| c.is_whitespace()) {
            return Err(CredentialError::InvalidEmail(
                "Email cannot contain whitespace".to_string(),
            ));
        }

        let Some((local, domain)) = email.split_once('@') else {
            return Err(CredentialError::InvalidEmail(
                "Email must contain an @".to_string(),
            ));
        };

        if local.is_empty() || domain.contains('@') {
            return Err(CredentialError::InvalidEmail(
                "Email must have a single @ with a non-empty local part".to_string(),
            ));
        }

        match domain.rfind('.') {
            Some(dot) if dot > 0 && dot < domain.len() - 1 => Ok(()),
            _ => Err(CredentialError::InvalidEmail(
                "Email domain must contain a dot".to_string(),
            )),
        }
    }

    /// Validate secondary contact length; the value is stored as given.
    fn validate_contact(contact: &str) -> CredentialResult<()> {
        if contact.len() > CONTACT_MAX_LEN {
            return Err(CredentialError::InvalidContact(
                "Contact must be at most 32 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate password strength
    fn validate_password(&self, password: &str) -> CredentialResult<()> {
        if password.len() < self.policy.min_length {
            return Err(CredentialError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.policy.min_length
            )));
        }

        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
        let has_symbol = password.chars().any(|c| c.is_ascii_punctuation());

        if !has_digit || !has_uppercase || !has_lowercase || !has_symbol {
            return Err(CredentialError::WeakPassword(
                "Password must contain an uppercase letter, a lowercase letter, a digit, and a symbol"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
