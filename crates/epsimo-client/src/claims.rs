//! Inspection of the platform's session JWT.
//!
//! The client never verifies the token (the backend does); it only reads the
//! payload to show which project a session is scoped to and when it expires.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

/// Claims carried by a platform session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Backend user id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Project the token is scoped to, once a project is selected.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Expiration timestamp (seconds since the epoch).
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Error returned when a token payload cannot be read.
#[derive(Debug, thiserror::Error)]
#[error("unreadable session token: {0}")]
pub struct ClaimsError(#[from] jsonwebtoken::errors::Error);

impl TokenClaims {
    /// Decode the payload of `token` without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a well-formed JWT.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(data.claims)
    }

    /// When the token expires, if it carries an `exp` claim.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Whether the token is expired at `now`. Tokens without `exp` never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}
