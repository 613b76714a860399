//! Per-source-address rate limiting with progressive penalties.

use chrono::{DateTime, Duration, Utc};

use crate::store::{MemoryTable, StoreError};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: i64,

    /// Base block duration in seconds; grows with repeat violations
    pub base_block_secs: i64,

    /// Bound on tracked source addresses; oldest-idle entries are evicted
    /// beyond this
    pub max_entries: usize,

    /// Whether to admit requests when the backing table fails (the
    /// documented risk-accepting default) or deny them
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            base_block_secs: 300,
            max_entries: 10_000,
            fail_open: true,
        }
    }
}

/// Per-address accounting record
#[derive(Debug, Clone)]
struct RateLimitEntry {
    window_start: DateTime<Utc>,
    request_count: u32,
    blocked_until: Option<DateTime<Utc>>,
    violation_count: u32,
    lifetime_request_count: u64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl RateLimitEntry {
    /// Entry for a first-seen address, with this request already counted.
    fn first_request(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            request_count: 1,
            blocked_until: None,
            violation_count: 0,
            lifetime_request_count: 1,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Instant after which this entry counts as idle for eviction purposes.
    /// A blocked entry is not idle until its block has run out.
    fn idle_rank(&self) -> DateTime<Utc> {
        match self.blocked_until {
            Some(blocked_until) => blocked_until.max(self.last_seen),
            None => self.last_seen,
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone)]
pub enum RateLimitDecision {
    /// Request is admitted
    Allowed { remaining: u32 },

    /// Request is denied while the address is blocked
    Blocked { retry_after: i64 },
}

impl RateLimitDecision {
    /// Check if the request is admitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    /// Get remaining requests in the window (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitDecision::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Get seconds until the block lifts (if blocked)
    pub fn retry_after(&self) -> Option<i64> {
        match self {
            RateLimitDecision::Blocked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Fixed-window rate limiter keyed by source address, independent of user
/// identity.
///
/// Each address gets `max_requests` per `window_secs` window. Exceeding the
/// ceiling blocks the address for `base_block_secs × (violations + 1)`, so
/// repeat offenders wait progressively longer. Requests arriving while
/// blocked are denied without touching the entry, and the whole
/// check-then-count step runs as one atomic critical section per address.
pub struct RateLimiter {
    table: MemoryTable<String, RateLimitEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            table: MemoryTable::bounded(config.max_entries),
            config,
        }
    }

    /// Atomically check and count a request from `source_address`.
    ///
    /// Combining the check and the increment in one critical section keeps
    /// two concurrent requests from both observing a count one under the
    /// ceiling and both passing.
    ///
    /// # Arguments
    ///
    /// * `source_address` - Caller's source address
    /// * `now` - Current instant
    ///
    /// # Returns
    ///
    /// * `RateLimitDecision` - Allowed with the remaining budget, or Blocked
    ///   with a retry-after hint
    pub async fn admit(&self, source_address: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let key = source_address.to_string();

        match self.try_admit(&key, now).await {
            Ok(decision) => decision,
            Err(StoreError::Capacity { .. }) => {
                // Full table: evict the oldest-idle address and retry once
                let evicted = self.table.evict_min_by(RateLimitEntry::idle_rank).await;
                if let Some(address) = evicted {
                    log::info!("rate limiter evicted idle entry for {address}");
                    if let Ok(decision) = self.try_admit(&key, now).await {
                        return decision;
                    }
                }
                self.storage_failure(source_address)
            }
            Err(_) => self.storage_failure(source_address),
        }
    }

    async fn try_admit(
        &self,
        key: &String,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        self.table
            .update_or_insert(
                key,
                || RateLimitEntry::first_request(now),
                |entry, is_new| Self::decide(entry, is_new, &self.config, now),
            )
            .await
    }

    /// The fixed-window decision, run under the entry's lock.
    fn decide(
        entry: &mut RateLimitEntry,
        is_new: bool,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        if is_new {
            // first_request already counted this request
            return RateLimitDecision::Allowed {
                remaining: config.max_requests.saturating_sub(1),
            };
        }

        // An active block denies without mutating the entry
        if let Some(blocked_until) = entry.blocked_until
            && now < blocked_until
        {
            return RateLimitDecision::Blocked {
                retry_after: (blocked_until - now).num_seconds(),
            };
        }

        entry.last_seen = now;
        entry.lifetime_request_count += 1;

        // Window elapsed: start a fresh one with this request counted
        if now - entry.window_start >= Duration::seconds(config.window_secs) {
            entry.window_start = now;
            entry.request_count = 1;
            return RateLimitDecision::Allowed {
                remaining: config.max_requests.saturating_sub(1),
            };
        }

        entry.request_count += 1;
        if entry.request_count > config.max_requests {
            let block_secs = config.base_block_secs * (i64::from(entry.violation_count) + 1);
            entry.blocked_until = Some(now + Duration::seconds(block_secs));
            entry.violation_count += 1;
            log::warn!(
                "rate limit exceeded: {} requests in window, blocking for {block_secs}s (violation #{})",
                entry.request_count,
                entry.violation_count
            );
            return RateLimitDecision::Blocked {
                retry_after: block_secs,
            };
        }

        RateLimitDecision::Allowed {
            remaining: config.max_requests - entry.request_count,
        }
    }

    fn storage_failure(&self, source_address: &str) -> RateLimitDecision {
        if self.config.fail_open {
            log::warn!("rate limiter storage failure for {source_address}: admitting (fail-open)");
            RateLimitDecision::Allowed { remaining: 0 }
        } else {
            log::warn!("rate limiter storage failure for {source_address}: denying (fail-closed)");
            RateLimitDecision::Blocked {
                retry_after: self.config.base_block_secs,
            }
        }
    }

    /// Forget all accounting for `source_address`.
    pub async fn reset(&self, source_address: &str) -> bool {
        self.table.delete(&source_address.to_string()).await
    }

    /// Number of addresses currently tracked.
    pub fn tracked_addresses(&self) -> usize {
        self.table.len()
    }
}
