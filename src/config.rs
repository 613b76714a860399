//! Gate configuration management.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration. Every variable is prefixed `TG_`; secrets are required,
//! everything else falls back to the reference defaults.

use crate::credentials::PasswordPolicy;
use crate::lockout::LockoutConfig;
use crate::security::RateLimitConfig;
use crate::session::SessionConfig;

/// Complete gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Session manager configuration
    pub session: SessionConfig,
    /// Account lockout configuration
    pub lockout: LockoutConfig,
    /// Rate limiter configuration
    pub rate_limit: RateLimitConfig,
    /// Password strength policy
    pub password_policy: PasswordPolicy,
    /// Secret material
    pub secrets: SecretsConfig,
    /// Bound on concurrently executing gate operations
    pub max_inflight: usize,
    /// Bound on stored user records
    pub max_users: usize,
    /// Whether mutating requests must carry the session's CSRF token
    pub csrf_protection: bool,
    /// Whether sessions are only honored from their creating source address
    pub bind_sessions_to_address: bool,
}

/// Secret material (required in production)
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    /// Bearer token signing secret
    pub jwt_secret: String,
    /// Password hashing pepper
    pub password_pepper: String,
}

impl GateConfig {
    /// Load configuration from environment variables
    ///
    /// # Returns
    ///
    /// * `Result<GateConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret is missing or too short.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Secrets (REQUIRED)
        let jwt_secret =
            std::env::var("TG_JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
                var: "TG_JWT_SECRET".to_string(),
                hint: "Generate with: openssl rand -hex 32".to_string(),
            })?;

        let password_pepper =
            std::env::var("TG_PASSWORD_PEPPER").map_err(|_| ConfigError::MissingRequired {
                var: "TG_PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "TG_JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "TG_PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        let session = SessionConfig {
            timeout_secs: parse_env_or("TG_SESSION_TIMEOUT_SECS", 3600),
            otp_length: parse_env_or("TG_OTP_LENGTH", 6),
            max_otp_attempts: parse_env_or("TG_MAX_OTP_ATTEMPTS", 5),
            max_sessions: parse_env_or("TG_MAX_SESSIONS", 10_000),
            bearer_ttl_secs: parse_env_or("TG_BEARER_TTL_SECS", 900),
        };

        let lockout = LockoutConfig {
            max_failed_attempts: parse_env_or("TG_LOCKOUT_MAX_FAILED_ATTEMPTS", 5),
            lockout_secs: parse_env_or("TG_LOCKOUT_SECS", 1800),
        };

        let rate_limit = RateLimitConfig {
            max_requests: parse_env_or("TG_RATE_MAX_REQUESTS", 100),
            window_secs: parse_env_or("TG_RATE_WINDOW_SECS", 60),
            base_block_secs: parse_env_or("TG_RATE_BASE_BLOCK_SECS", 300),
            max_entries: parse_env_or("TG_RATE_MAX_ENTRIES", 10_000),
            fail_open: parse_env_or("TG_RATE_FAIL_OPEN", true),
        };

        let password_policy = PasswordPolicy {
            min_length: parse_env_or("TG_PASSWORD_MIN_LENGTH", 8),
        };

        Ok(GateConfig {
            session,
            lockout,
            rate_limit,
            password_policy,
            secrets: SecretsConfig {
                jwt_secret,
                password_pepper,
            },
            max_inflight: parse_env_or("TG_MAX_INFLIGHT", 256),
            max_users: parse_env_or("TG_MAX_USERS", 10_000),
            csrf_protection: parse_env_or("TG_CSRF_PROTECTION", true),
            bind_sessions_to_address: parse_env_or("TG_BIND_SESSIONS_TO_ADDRESS", true),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "TG_SESSION_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.session.otp_length < 4 || self.session.otp_length > 10 {
            return Err(ConfigError::Invalid {
                var: "TG_OTP_LENGTH".to_string(),
                reason: "Must be between 4 and 10 digits".to_string(),
            });
        }

        if self.session.max_otp_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "TG_MAX_OTP_ATTEMPTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.lockout.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "TG_LOCKOUT_MAX_FAILED_ATTEMPTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.lockout.lockout_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "TG_LOCKOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                var: "TG_RATE_MAX_REQUESTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.window_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "TG_RATE_WINDOW_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.base_block_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "TG_RATE_BASE_BLOCK_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.password_policy.min_length < 8 {
            return Err(ConfigError::Invalid {
                var: "TG_PASSWORD_MIN_LENGTH".to_string(),
                reason: "Must be at least 8".to_string(),
            });
        }

        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid {
                var: "TG_MAX_INFLIGHT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for GateConfig {
    /// Reference configuration with development-only secrets. Production
    /// deployments load real secrets via [`GateConfig::from_env`].
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            lockout: LockoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            password_policy: PasswordPolicy::default(),
            secrets: SecretsConfig {
                jwt_secret: "dev-only-jwt-secret-do-not-deploy!!!".to_string(),
                password_pepper: "dev-only-pepper!".to_string(),
            },
            max_inflight: 256,
            max_users: 10_000,
            csrf_protection: true,
            bind_sessions_to_address: true,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
