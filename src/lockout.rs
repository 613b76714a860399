//! Per-user account lockout after repeated credential failures.
//!
//! Lockout is orthogonal to rate limiting: it punishes wrong credentials
//! for one identity no matter where the attempts come from, while the rate
//! limiter counts raw request volume per source address no matter whose
//! credentials are tried. Both run on every login attempt; the address
//! check runs first because it is cheaper.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::store::{MemoryTable, StoreResult};

/// Lockout configuration
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failed attempts before the account locks
    pub max_failed_attempts: u32,

    /// Lock duration in seconds
    pub lockout_secs: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_secs: 1800,
        }
    }
}

/// Failed-attempt counter and lock deadline for one user
#[derive(Debug, Clone, Default)]
struct LockoutState {
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// Below the threshold; this many attempts remain before the lock
    Counting { remaining: u32 },

    /// The account is locked until the given instant
    LockedOut { until: DateTime<Utc> },
}

/// Tracks failed-login counters and temporary account locks per user.
///
/// The counter saturates at the configured threshold and stays there until
/// a successful full authentication clears it, so an account at the
/// threshold re-locks on every further failure.
pub struct LockoutPolicy {
    table: MemoryTable<Uuid, LockoutState>,
    config: LockoutConfig,
}

impl LockoutPolicy {
    /// Create a lockout policy with the given configuration.
    pub fn new(config: LockoutConfig) -> Self {
        Self {
            table: MemoryTable::new(),
            config,
        }
    }

    /// Record a failed credential check for `user_id`.
    ///
    /// Increments the counter as one atomic step; on reaching the threshold
    /// the account locks for the configured duration and the deadline is
    /// reported so the caller can surface a retry-after hint.
    ///
    /// # Errors
    ///
    /// Returns a store error if the state could not be recorded; the
    /// attempt is then not counted.
    pub async fn on_failed_attempt(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<LockoutStatus> {
        let config = self.config.clone();
        self.table
            .update_or_insert(&user_id, LockoutState::default, move |state, _| {
                state.failed_attempts = (state.failed_attempts + 1).min(config.max_failed_attempts);
                if state.failed_attempts >= config.max_failed_attempts {
                    let until = now + Duration::seconds(config.lockout_secs);
                    state.locked_until = Some(until);
                    LockoutStatus::LockedOut { until }
                } else {
                    LockoutStatus::Counting {
                        remaining: config.max_failed_attempts - state.failed_attempts,
                    }
                }
            })
            .await
    }

    /// Clear the counter and any lock after a successful authentication.
    pub async fn on_success(&self, user_id: Uuid) {
        self.table.delete(&user_id).await;
    }

    /// The lock deadline for `user_id`, if one is set and still in the
    /// future. Read-only; checking never mutates the counter.
    pub async fn is_locked(&self, user_id: Uuid, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.table
            .get(&user_id)
            .await
            .and_then(|state| state.locked_until)
            .filter(|until| *until > now)
    }

    /// Current failed-attempt count for `user_id`.
    pub async fn failed_attempts(&self, user_id: Uuid) -> u32 {
        self.table
            .get(&user_id)
            .await
            .map(|state| state.failed_attempts)
            .unwrap_or(0)
    }
}
