//! Gate orchestrator implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::admission::{AdmissionLimiter, AdmissionPermit};
use super::errors::{GateError, GateResult};
use super::models::{ResentOtp, StepOneResponse, StepThreeResponse, StepTwoResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::credentials::{CredentialStore, RegisterRequest};
use crate::lockout::{LockoutPolicy, LockoutStatus};
use crate::security::rate_limiter::RateLimiter;
use crate::security::tokens::BearerClaims;
use crate::session::{AuthStep, SessionManager, StepUpVerifier};

/// Composes the credential store, lockout policy, rate limiter, and session
/// manager into the operations a transport layer calls with already-parsed
/// fields.
///
/// Every operation runs admission and the per-address rate limit before
/// touching any other table; step 1 additionally consults the lockout
/// policy before verifying a password.
pub struct AuthGateway {
    credentials: CredentialStore,
    lockout: LockoutPolicy,
    rate_limiter: RateLimiter,
    sessions: Arc<SessionManager>,
    admission: AdmissionLimiter,
    clock: Arc<dyn Clock>,
    csrf_protection: bool,
    bind_sessions_to_address: bool,
}

impl AuthGateway {
    /// Create a gateway with the system clock and the no-op step-up gate.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated gate configuration
    pub fn new(config: GateConfig) -> Self {
        let verifier: Box<dyn StepUpVerifier> = Box::new(crate::session::AcceptAll);
        Self::with_parts(config, verifier, Arc::new(SystemClock))
    }

    /// Create a gateway with a custom step-up verifier and clock.
    ///
    /// Tests pass a [`crate::clock::ManualClock`] here to drive expiry and
    /// lockout deterministically.
    pub fn with_parts(
        config: GateConfig,
        verifier: Box<dyn StepUpVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(
                config.secrets.password_pepper.clone(),
                config.password_policy.clone(),
                config.max_users,
            ),
            lockout: LockoutPolicy::new(config.lockout.clone()),
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            sessions: Arc::new(SessionManager::with_verifier(
                config.session.clone(),
                &config.secrets.jwt_secret,
                verifier,
            )),
            admission: AdmissionLimiter::new(config.max_inflight),
            clock,
            csrf_protection: config.csrf_protection,
            bind_sessions_to_address: config.bind_sessions_to_address,
        }
    }

    /// Register a new user.
    ///
    /// # Arguments
    ///
    /// * `request` - Already-parsed registration fields
    /// * `source_address` - Caller's source address, for rate limiting
    ///
    /// # Returns
    ///
    /// * `GateResult<Uuid>` - The new user's id
    ///
    /// # Errors
    ///
    /// * [`GateError::Validation`] - Malformed field or weak password
    /// * [`GateError::AlreadyRegistered`] - Username or email taken
    /// * [`GateError::RateLimited`] / [`GateError::AtCapacity`]
    pub async fn register(
        &self,
        request: RegisterRequest,
        source_address: &str,
    ) -> GateResult<Uuid> {
        let _permit = self.guard(source_address).await?;
        let user_id = self
            .credentials
            .register(request, self.clock.now())
            .await?;
        Ok(user_id)
    }

    /// Login step 1: verify credentials and open a session.
    ///
    /// Order per attempt: rate limit, input presence, lockout check,
    /// password verify. A failed verify feeds the lockout counter; success
    /// clears it and starts a session at `AwaitingOtp`.
    ///
    /// # Errors
    ///
    /// * [`GateError::InvalidCredentials`] - Unknown user or wrong password,
    ///   indistinguishable by design
    /// * [`GateError::AccountLocked`] - Lock in effect, with retry-after
    /// * [`GateError::RateLimited`] / [`GateError::AtCapacity`]
    pub async fn login_step1(
        &self,
        username: &str,
        password: &str,
        source_address: &str,
    ) -> GateResult<StepOneResponse> {
        let _permit = self.guard(source_address).await?;
        if username.is_empty() || password.is_empty() {
            return Err(GateError::Validation("Missing credentials".to_string()));
        }
        let now = self.clock.now();

        // Unknown users fall through to the same uniform error as a wrong
        // password, without feeding any lockout counter
        let Some(user) = self.credentials.find_active(username).await else {
            return Err(GateError::InvalidCredentials);
        };

        if let Some(until) = self.lockout.is_locked(user.id, now).await {
            log::warn!("login attempt for locked account {username} from {source_address}");
            return Err(GateError::AccountLocked {
                retry_after: (until - now).num_seconds(),
            });
        }

        if self
            .credentials
            .verify_password(password, &user.password_hash)
            .is_err()
        {
            return Err(match self.lockout.on_failed_attempt(user.id, now).await? {
                LockoutStatus::LockedOut { until } => {
                    log::warn!(
                        "account locked for {username} after repeated failures, last from {source_address}"
                    );
                    GateError::AccountLocked {
                        retry_after: (until - now).num_seconds(),
                    }
                }
                LockoutStatus::Counting { .. } => GateError::InvalidCredentials,
            });
        }

        self.lockout.on_success(user.id).await;

        let session = self.sessions.start(username, source_address, now).await?;
        log::info!("step 1 passed for {username} from {source_address}");
        Ok(StepOneResponse {
            session_id: session.session_id,
            csrf_token: session.csrf_token,
            otp: session.otp,
            current_step: session.current_step,
            expires_at: session.expires_at,
        })
    }

    /// Login step 2: verify the one-time code.
    ///
    /// # Errors
    ///
    /// * [`GateError::InvalidSession`] - Session dead, wrong step, or bound
    ///   to a different source address
    /// * [`GateError::InvalidOtp`] - Code mismatch, including the final
    ///   attempt that invalidates the session
    /// * [`GateError::RateLimited`] / [`GateError::AtCapacity`]
    pub async fn login_step2(
        &self,
        session_id: &str,
        otp: &str,
        source_address: &str,
    ) -> GateResult<StepTwoResponse> {
        let _permit = self.guard(source_address).await?;
        if session_id.is_empty() || otp.is_empty() {
            return Err(GateError::Validation(
                "Missing session or OTP".to_string(),
            ));
        }
        let now = self.clock.now();
        self.check_address_binding(session_id, source_address, now)
            .await?;

        let current_step = self.sessions.verify_otp(session_id, otp, now).await?;
        Ok(StepTwoResponse { current_step })
    }

    /// Login step 3: pass the step-up gate and collect a bearer token.
    ///
    /// `evidence` is handed to the configured [`StepUpVerifier`]; the
    /// default gate accepts anything, including an empty string.
    ///
    /// # Errors
    ///
    /// * [`GateError::InvalidSession`] - Session dead or not at
    ///   `OtpVerified`
    /// * [`GateError::StepUpRejected`] - Verifier refused the evidence
    /// * [`GateError::RateLimited`] / [`GateError::AtCapacity`]
    pub async fn login_step3(
        &self,
        session_id: &str,
        evidence: &str,
        source_address: &str,
    ) -> GateResult<StepThreeResponse> {
        let _permit = self.guard(source_address).await?;
        if session_id.is_empty() {
            return Err(GateError::Validation("Missing session".to_string()));
        }
        let now = self.clock.now();
        self.check_address_binding(session_id, source_address, now)
            .await?;

        let access_token = self.sessions.complete_step(session_id, evidence, now).await?;
        Ok(StepThreeResponse {
            access_token,
            current_step: AuthStep::Authenticated,
        })
    }

    /// Regenerate the session's one-time code.
    ///
    /// Valid until the session authenticates; the session's step and expiry
    /// are untouched.
    pub async fn resend_otp(
        &self,
        session_id: &str,
        source_address: &str,
    ) -> GateResult<ResentOtp> {
        let _permit = self.guard(source_address).await?;
        if session_id.is_empty() {
            return Err(GateError::Validation("Missing session".to_string()));
        }
        let now = self.clock.now();
        self.check_address_binding(session_id, source_address, now)
            .await?;

        let otp = self.sessions.resend_otp(session_id, now).await?;
        Ok(ResentOtp { otp })
    }

    /// Explicitly end a session.
    ///
    /// A mutating request: the CSRF token is checked when protection is
    /// enabled.
    pub async fn logout(
        &self,
        session_id: &str,
        csrf_token: &str,
        source_address: &str,
    ) -> GateResult<()> {
        let username = self
            .authorize(session_id, Some(csrf_token), source_address, true)
            .await?;
        self.sessions.invalidate(session_id).await;
        log::info!("logout for {username}");
        Ok(())
    }

    /// Authorize a capability-bearing request from the surrounding layer.
    ///
    /// Checks session aliveness, the source-address binding when enabled,
    /// and the CSRF token on mutating requests when protection is enabled.
    /// Returns the session's username for the caller's own bookkeeping.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session credential presented by the caller
    /// * `csrf_token` - CSRF token, required when `mutating` and protection
    ///   is on
    /// * `source_address` - Caller's source address
    /// * `mutating` - Whether the request changes state
    pub async fn authorize(
        &self,
        session_id: &str,
        csrf_token: Option<&str>,
        source_address: &str,
        mutating: bool,
    ) -> GateResult<String> {
        let _permit = self.guard(source_address).await?;
        if session_id.is_empty() {
            return Err(GateError::Validation("Missing session".to_string()));
        }
        let now = self.clock.now();

        let session = self.sessions.validate(session_id, now).await?;
        self.enforce_binding(&session.username, &session.source_address, source_address)?;

        if mutating && self.csrf_protection {
            let provided = csrf_token.ok_or(GateError::CsrfRejected)?;
            self.sessions.validate_csrf(session_id, provided, now).await?;
        }

        Ok(session.username)
    }

    /// Verify a bearer token issued at step 3.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidSession`] for a bad signature, malformed
    /// token, or elapsed expiry.
    pub fn verify_bearer(&self, token: &str) -> GateResult<BearerClaims> {
        self.sessions
            .verify_bearer(token)
            .map_err(|_| GateError::InvalidSession)
    }

    /// Spawn the periodic expiry sweep, returning its task handle.
    ///
    /// The task runs until aborted; each pass logs the number of sessions
    /// it collected.
    pub fn run_expiry_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sessions.expire_sweep(clock.now()).await;
            }
        })
    }

    /// The session manager, for hosts composing task-layer checks directly.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The credential store, for hosts exposing password change or
    /// deactivation endpoints.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Admission and rate-limit checks shared by every operation. The
    /// returned permit is held for the rest of the request.
    async fn guard(&self, source_address: &str) -> GateResult<AdmissionPermit> {
        let permit = self.admission.try_acquire().ok_or(GateError::AtCapacity)?;

        let decision = self
            .rate_limiter
            .admit(source_address, self.clock.now())
            .await;
        if let Some(retry_after) = decision.retry_after() {
            log::debug!("denied rate-limited request from {source_address}");
            return Err(GateError::RateLimited { retry_after });
        }

        Ok(permit)
    }

    /// Enforce the session's source-address binding on step 2/3 and resend.
    async fn check_address_binding(
        &self,
        session_id: &str,
        source_address: &str,
        now: DateTime<Utc>,
    ) -> GateResult<()> {
        if !self.bind_sessions_to_address {
            return Ok(());
        }
        let session = self.sessions.validate(session_id, now).await?;
        self.enforce_binding(&session.username, &session.source_address, source_address)
    }

    fn enforce_binding(
        &self,
        username: &str,
        bound_address: &str,
        source_address: &str,
    ) -> GateResult<()> {
        if self.bind_sessions_to_address && bound_address != source_address {
            log::warn!(
                "SESSION_IP_MISMATCH for {username}: bound to {bound_address}, request from {source_address}"
            );
            return Err(GateError::InvalidSession);
        }
        Ok(())
    }
}
