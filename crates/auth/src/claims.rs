use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use agora_core::UserId;

use crate::token::{SigningError, TokenError};

/// Signed token payload.
///
/// Timestamps travel as JWT `NumericDate` (whole seconds since the epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user the token was issued to.
    pub sub: UserId,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

impl TokenClaims {
    /// Fails when `issued_at + ttl` is outside the representable time range.
    pub fn new(sub: UserId, issued_at: DateTime<Utc>, ttl: Duration) -> Result<Self, SigningError> {
        // NumericDate has second precision; truncate so sign/validate agree.
        let iat = DateTime::from_timestamp(issued_at.timestamp(), 0).unwrap_or(issued_at);
        let exp = iat
            .checked_add_signed(ttl)
            .ok_or_else(|| SigningError::new(format!("expiry out of range for lifetime {ttl}")))?;
        Ok(Self { sub, iat, exp })
    }
}

/// Deterministically validate the time window of already-verified claims.
///
/// A token is still valid at the instant `now == exp`; it expires strictly after.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::Malformed);
    }
    if now > claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}
