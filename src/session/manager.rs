//! Session manager implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::errors::{SessionError, SessionResult};
use super::models::{AuthStep, Session};
use crate::security::tokens::{self, BearerClaims, TokenIssuer};
use crate::store::MemoryTable;

/// Session manager tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute session lifetime in seconds, counted from creation
    pub timeout_secs: i64,
    /// One-time code length in decimal digits
    pub otp_length: usize,
    /// Wrong one-time codes tolerated before the session is invalidated
    pub max_otp_attempts: u32,
    /// Bound on concurrently stored sessions
    pub max_sessions: usize,
    /// Bearer token lifetime in seconds
    pub bearer_ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
            otp_length: 6,
            max_otp_attempts: 5,
            max_sessions: 10_000,
            bearer_ttl_secs: 900, // 15 minutes
        }
    }
}

/// Gate consulted before a session reaches the authenticated step.
///
/// The shipped [`AcceptAll`] implementation accepts unconditionally; a real
/// step-up factor (biometric, hardware key) implements this trait and plugs
/// in at construction without touching the state machine.
#[async_trait]
pub trait StepUpVerifier: Send + Sync {
    /// Judge the evidence supplied with the final login step.
    async fn verify(&self, username: &str, evidence: &str) -> bool;
}

/// Step-up gate that accepts any evidence.
pub struct AcceptAll;

#[async_trait]
impl StepUpVerifier for AcceptAll {
    async fn verify(&self, _username: &str, _evidence: &str) -> bool {
        true
    }
}

/// Owns the session table and the multi-step state machine.
///
/// Steps move `AwaitingOtp` → `OtpVerified` → `Authenticated` and never
/// backward. Every transition runs as one atomic critical section on the
/// session record, so concurrent calls on one session serialize cleanly.
pub struct SessionManager {
    sessions: MemoryTable<String, Session>,
    issuer: TokenIssuer,
    verifier: Box<dyn StepUpVerifier>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a session manager with the no-op step-up gate.
    ///
    /// # Arguments
    ///
    /// * `config` - Session tuning
    /// * `jwt_secret` - Secret key for bearer token signing
    pub fn new(config: SessionConfig, jwt_secret: &str) -> Self {
        Self::with_verifier(config, jwt_secret, Box::new(AcceptAll))
    }

    /// Create a session manager with a custom step-up verifier.
    pub fn with_verifier(
        config: SessionConfig,
        jwt_secret: &str,
        verifier: Box<dyn StepUpVerifier>,
    ) -> Self {
        Self {
            sessions: MemoryTable::bounded(config.max_sessions),
            issuer: TokenIssuer::new(jwt_secret, config.bearer_ttl_secs),
            verifier,
            config,
        }
    }

    /// Start a login flow for `username`.
    ///
    /// Generates an unguessable session id, a CSRF token, and a fresh
    /// one-time code; the session starts at `AwaitingOtp` and expires
    /// `timeout_secs` after `now`. Multiple concurrent sessions per user
    /// are permitted.
    ///
    /// # Errors
    ///
    /// Returns a store error when the session table is full.
    pub async fn start(
        &self,
        username: &str,
        source_address: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Session> {
        let session = Session {
            session_id: tokens::session_id(),
            username: username.to_string(),
            current_step: AuthStep::AwaitingOtp,
            otp: tokens::numeric_code(self.config.otp_length),
            otp_attempts: 0,
            csrf_token: tokens::csrf_token(),
            created_at: now,
            expires_at: now + Duration::seconds(self.config.timeout_secs),
            source_address: source_address.to_string(),
            is_active: true,
        };

        self.sessions
            .try_insert(session.session_id.clone(), session.clone())
            .await?;

        log::debug!("session started for {username} from {source_address}");
        Ok(session)
    }

    /// Verify the one-time code (login step 2).
    ///
    /// Valid only while the session is alive and at `AwaitingOtp`. The
    /// comparison is constant-time. A wrong code increments the retry
    /// counter; on the configured limit the session is invalidated.
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidSession`] - Unknown, inactive, or expired
    /// * [`SessionError::WrongStep`] - Session already past `AwaitingOtp`
    /// * [`SessionError::InvalidOtp`] - Code mismatch, retries remain
    /// * [`SessionError::OtpAttemptsExhausted`] - Code mismatch on the last
    ///   allowed attempt; the session is now dead
    pub async fn verify_otp(
        &self,
        session_id: &str,
        provided: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<AuthStep> {
        let max_attempts = self.config.max_otp_attempts;
        self.sessions
            .update(&session_id.to_string(), |session| {
                if !session.is_alive(now) {
                    return Err(SessionError::InvalidSession);
                }
                if session.current_step != AuthStep::AwaitingOtp {
                    return Err(SessionError::WrongStep);
                }
                if tokens::constant_time_eq(provided, &session.otp) {
                    session.current_step = AuthStep::OtpVerified;
                    return Ok(AuthStep::OtpVerified);
                }
                session.otp_attempts += 1;
                if session.otp_attempts >= max_attempts {
                    session.is_active = false;
                    log::warn!(
                        "OTP attempts exhausted for {}, session invalidated",
                        session.username
                    );
                    return Err(SessionError::OtpAttemptsExhausted);
                }
                Err(SessionError::InvalidOtp)
            })
            .await
            .ok_or(SessionError::InvalidSession)?
    }

    /// Complete the final step (login step 3), returning a bearer token.
    ///
    /// Valid only from `OtpVerified`. The step-up verifier runs outside the
    /// session lock; the transition re-checks the step under the lock, so
    /// when two calls race exactly one issues a token and the other sees
    /// `WrongStep`.
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidSession`] - Unknown, inactive, or expired
    /// * [`SessionError::WrongStep`] - Session not at `OtpVerified`
    /// * [`SessionError::StepUpRejected`] - Verifier refused the evidence
    /// * [`SessionError::Jwt`] - Token signing failed
    pub async fn complete_step(
        &self,
        session_id: &str,
        evidence: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<String> {
        let snapshot = self.validate(session_id, now).await?;
        if snapshot.current_step != AuthStep::OtpVerified {
            return Err(SessionError::WrongStep);
        }
        if !self.verifier.verify(&snapshot.username, evidence).await {
            log::warn!("step-up verification rejected for {}", snapshot.username);
            return Err(SessionError::StepUpRejected);
        }

        let username = self
            .sessions
            .update(&session_id.to_string(), |session| {
                if !session.is_alive(now) {
                    return Err(SessionError::InvalidSession);
                }
                if session.current_step != AuthStep::OtpVerified {
                    return Err(SessionError::WrongStep);
                }
                session.current_step = AuthStep::Authenticated;
                Ok(session.username.clone())
            })
            .await
            .ok_or(SessionError::InvalidSession)??;

        let token = self.issuer.issue(&username, session_id, now)?;
        log::info!("session authenticated for {username}");
        Ok(token)
    }

    /// Regenerate the one-time code in place.
    ///
    /// Valid in any non-terminal state. Step, creation time, expiry, and
    /// the retry counter are untouched.
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidSession`] - Unknown, inactive, or expired
    /// * [`SessionError::WrongStep`] - Session already authenticated
    pub async fn resend_otp(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<String> {
        let otp_length = self.config.otp_length;
        self.sessions
            .update(&session_id.to_string(), |session| {
                if !session.is_alive(now) {
                    return Err(SessionError::InvalidSession);
                }
                if session.current_step.is_terminal() {
                    return Err(SessionError::WrongStep);
                }
                session.otp = tokens::numeric_code(otp_length);
                Ok(session.otp.clone())
            })
            .await
            .ok_or(SessionError::InvalidSession)?
    }

    /// Fetch the session iff it is alive at `now`.
    ///
    /// An expired or inactive session is reported exactly like a missing
    /// one.
    pub async fn validate(&self, session_id: &str, now: DateTime<Utc>) -> SessionResult<Session> {
        self.sessions
            .get(&session_id.to_string())
            .await
            .filter(|session| session.is_alive(now))
            .ok_or(SessionError::InvalidSession)
    }

    /// Validate aliveness plus the CSRF token supplied on a mutating
    /// request. The token comparison is constant-time.
    pub async fn validate_csrf(
        &self,
        session_id: &str,
        provided: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Session> {
        let session = self.validate(session_id, now).await?;
        if !tokens::constant_time_eq(provided, &session.csrf_token) {
            return Err(SessionError::InvalidCsrf);
        }
        Ok(session)
    }

    /// Explicitly end a session, reporting whether one existed.
    pub async fn invalidate(&self, session_id: &str) -> bool {
        self.sessions.delete(&session_id.to_string()).await
    }

    /// Remove every expired or inactive session. Idempotent; safe against
    /// concurrent validations.
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> usize {
        let removed = self.sessions.sweep(|session| !session.is_alive(now)).await;
        if removed > 0 {
            log::info!("swept {removed} dead sessions");
        }
        removed
    }

    /// Verify a bearer token issued by [`Self::complete_step`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Jwt`] for a bad signature, malformed token,
    /// or elapsed expiry.
    pub fn verify_bearer(&self, token: &str) -> SessionResult<BearerClaims> {
        Ok(self.issuer.verify(token)?)
    }

    /// Number of stored sessions, including dead ones not yet swept.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    const SECRET: &str = "unit-test-jwt-secret-0123456789abcdef";
    const ADDR: &str = "10.0.0.1";

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::default(), SECRET)
    }

    #[tokio::test]
    async fn test_start_creates_awaiting_otp_session() {
        let manager = manager();
        let now = Utc::now();

        let session = manager.start("alice", ADDR, now).await.unwrap();

        assert_eq!(session.current_step, AuthStep::AwaitingOtp);
        assert_eq!(session.session_id.len(), tokens::SESSION_ID_LEN);
        assert_eq!(session.csrf_token.len(), tokens::CSRF_TOKEN_LEN);
        assert_eq!(session.otp.len(), 6);
        assert!(session.otp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
        assert_eq!(session.source_address, ADDR);
        assert_eq!(manager.count(), 1);
    }

    #[tokio::test]
    async fn test_full_flow_advances_step_by_step() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();

        // Step 3 before step 2 is out of order
        let err = manager
            .complete_step(&session.session_id, "evidence", now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongStep));

        let step = manager
            .verify_otp(&session.session_id, &session.otp, now)
            .await
            .unwrap();
        assert_eq!(step, AuthStep::OtpVerified);

        // Step 2 cannot be replayed
        let err = manager
            .verify_otp(&session.session_id, &session.otp, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongStep));

        let token = manager
            .complete_step(&session.session_id, "evidence", now)
            .await
            .unwrap();
        let claims = manager.verify_bearer(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.sid, session.session_id);

        // Terminal state: step 3 cannot be replayed either
        let err = manager
            .complete_step(&session.session_id, "evidence", now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongStep));
    }

    #[tokio::test]
    async fn test_wrong_otp_counts_down_then_kills_session() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();
        let wrong = if session.otp == "000000" { "111111" } else { "000000" };

        for _ in 0..4 {
            let err = manager
                .verify_otp(&session.session_id, wrong, now)
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::InvalidOtp));
        }

        let err = manager
            .verify_otp(&session.session_id, wrong, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::OtpAttemptsExhausted));

        // The session is gone for every query, even with the right code
        let err = manager
            .verify_otp(&session.session_id, &session.otp, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidSession));
        assert!(manager.validate(&session.session_id, now).await.is_err());
    }

    #[tokio::test]
    async fn test_resend_replaces_otp_without_touching_expiry() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();

        let new_otp = manager.resend_otp(&session.session_id, now).await.unwrap();
        assert_eq!(new_otp.len(), 6);

        let current = manager.validate(&session.session_id, now).await.unwrap();
        assert_eq!(current.current_step, AuthStep::AwaitingOtp);
        assert_eq!(current.expires_at, session.expires_at);
        assert_eq!(current.created_at, session.created_at);
        assert_eq!(current.otp, new_otp);

        // Old code is dead if the resend changed it
        if new_otp != session.otp {
            let err = manager
                .verify_otp(&session.session_id, &session.otp, now)
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::InvalidOtp));
        }
        manager
            .verify_otp(&session.session_id, &new_otp, now)
            .await
            .unwrap();

        // Resend stays valid at OtpVerified but not once authenticated
        manager.resend_otp(&session.session_id, now).await.unwrap();
        manager
            .complete_step(&session.session_id, "evidence", now)
            .await
            .unwrap();
        let err = manager
            .resend_otp(&session.session_id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongStep));
    }

    #[tokio::test]
    async fn test_expiry_dominates_every_operation() {
        let manager = manager();
        let created = Utc::now();
        let session = manager.start("alice", ADDR, created).await.unwrap();
        let later = created + Duration::seconds(3601);

        assert!(manager.validate(&session.session_id, later).await.is_err());
        assert!(
            manager
                .verify_otp(&session.session_id, &session.otp, later)
                .await
                .is_err()
        );
        assert!(
            manager
                .complete_step(&session.session_id, "evidence", later)
                .await
                .is_err()
        );
        assert!(manager.resend_otp(&session.session_id, later).await.is_err());

        // Exactly at the boundary the session is already dead
        let boundary = created + Duration::seconds(3600);
        assert!(manager.validate(&session.session_id, boundary).await.is_err());
        // One second before, it is alive
        let before = created + Duration::seconds(3599);
        assert!(manager.validate(&session.session_id, before).await.is_ok());
    }

    #[tokio::test]
    async fn test_csrf_validation() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();

        manager
            .validate_csrf(&session.session_id, &session.csrf_token, now)
            .await
            .unwrap();

        let err = manager
            .validate_csrf(&session.session_id, "wrong-token", now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidCsrf));
    }

    #[tokio::test]
    async fn test_invalidate_and_sweep() {
        let manager = manager();
        let now = Utc::now();
        let s1 = manager.start("alice", ADDR, now).await.unwrap();
        let s2 = manager
            .start("bob", ADDR, now - Duration::seconds(7200))
            .await
            .unwrap();
        assert_eq!(manager.count(), 2);

        // s2 was created two hours ago and has expired
        assert_eq!(manager.expire_sweep(now).await, 1);
        assert_eq!(manager.count(), 1);
        assert!(manager.validate(&s2.session_id, now).await.is_err());
        assert!(manager.validate(&s1.session_id, now).await.is_ok());

        // Idempotent
        assert_eq!(manager.expire_sweep(now).await, 0);

        assert!(manager.invalidate(&s1.session_id).await);
        assert!(!manager.invalidate(&s1.session_id).await);
        assert!(manager.validate(&s1.session_id, now).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_per_user_are_independent() {
        let manager = manager();
        let now = Utc::now();
        let s1 = manager.start("alice", ADDR, now).await.unwrap();
        let s2 = manager.start("alice", "10.0.0.2", now).await.unwrap();
        assert_ne!(s1.session_id, s2.session_id);

        manager
            .verify_otp(&s1.session_id, &s1.otp, now)
            .await
            .unwrap();

        // Advancing s1 leaves s2 where it was
        let other = manager.validate(&s2.session_id, now).await.unwrap();
        assert_eq!(other.current_step, AuthStep::AwaitingOtp);
    }

    #[tokio::test]
    async fn test_racing_final_steps_issue_exactly_one_token() {
        let manager = Arc::new(manager());
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();
        manager
            .verify_otp(&session.session_id, &session.otp, now)
            .await
            .unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            let session_id = session.session_id.clone();
            tasks.spawn(async move {
                manager.complete_step(&session_id, "evidence", now).await
            });
        }

        let mut tokens_issued = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => tokens_issued += 1,
                Err(SessionError::WrongStep) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(tokens_issued, 1);
    }

    #[tokio::test]
    async fn test_rejecting_verifier_blocks_final_step() {
        struct RejectAll;

        #[async_trait]
        impl StepUpVerifier for RejectAll {
            async fn verify(&self, _username: &str, _evidence: &str) -> bool {
                false
            }
        }

        let manager = SessionManager::with_verifier(
            SessionConfig::default(),
            SECRET,
            Box::new(RejectAll),
        );
        let now = Utc::now();
        let session = manager.start("alice", ADDR, now).await.unwrap();
        manager
            .verify_otp(&session.session_id, &session.otp, now)
            .await
            .unwrap();

        let err = manager
            .complete_step(&session.session_id, "evidence", now)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StepUpRejected));

        // The failed gate does not advance the step
        let current = manager.validate(&session.session_id, now).await.unwrap();
        assert_eq!(current.current_step, AuthStep::OtpVerified);
    }

    #[tokio::test]
    async fn test_session_table_capacity() {
        let config = SessionConfig {
            max_sessions: 1,
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(config, SECRET);
        let now = Utc::now();

        manager.start("alice", ADDR, now).await.unwrap();
        let err = manager.start("bob", ADDR, now).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Store(crate::store::StoreError::Capacity { .. })
        ));
    }
}
