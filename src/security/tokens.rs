//! Secret material: random identifiers, one-time codes, and bearer tokens.
//!
//! All random values come from the process CSPRNG (`rand::rng()`), never a
//! seeded generator. Comparisons of secrets go through [`constant_time_eq`]
//! so a mismatch reveals nothing about the matching prefix.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Length of generated session identifiers.
pub const SESSION_ID_LEN: usize = 48;

/// Length of generated CSRF tokens.
pub const CSRF_TOKEN_LEN: usize = 32;

/// Generate an unguessable session identifier.
pub fn session_id() -> String {
    alphanumeric(SESSION_ID_LEN)
}

/// Generate a per-session CSRF token.
pub fn csrf_token() -> String {
    alphanumeric(CSRF_TOKEN_LEN)
}

/// Generate `len` random alphanumeric characters.
pub fn alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a one-time code of `len` decimal digits.
pub fn numeric_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Compare two secrets without leaking the position of a mismatch.
///
/// Differing lengths compare unequal immediately; length is not secret for
/// the fixed-size codes this crate generates.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Claims carried by an issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Username the capability is bound to
    pub sub: String,
    /// Session the token was issued from
    pub sid: String,
    /// Expiration time (unix timestamp)
    pub exp: i64,
    /// Issued at (unix timestamp)
    pub iat: i64,
}

/// Signs and verifies the bearer tokens handed out when a session reaches
/// the authenticated step.
///
/// The token is a capability distinct from the session id: the task layer
/// presents it on behalf of a user without ever holding the session cookie.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer signing with `secret`, valid for `ttl_secs` per token.
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a signed token bound to `username` and `session_id`.
    ///
    /// # Errors
    ///
    /// Returns the underlying JWT error if encoding fails.
    pub fn issue(
        &self,
        username: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = BearerClaims {
            sub: username.to_string(),
            sid: session_id.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns the underlying JWT error for a bad signature, malformed
    /// token, or elapsed expiry.
    pub fn verify(&self, token: &str) -> Result<BearerClaims, jsonwebtoken::errors::Error> {
        let data = decode::<BearerClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}
