//! HS256 identity tokens.
//!
//! `TokenService` holds nothing but an immutable key and a lifetime, so one
//! instance is shared by every request handler. Time is always passed in
//! (`*_at` variants) or read once from `Utc::now()`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

use agora_core::UserId;

use crate::claims::{validate_claims, TokenClaims};
use crate::principal::Identity;

/// Why a presented token was rejected.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Stable machine-readable code for transport layers.
    pub fn code(self) -> &'static str {
        match self {
            TokenError::Malformed => "token_malformed",
            TokenError::SignatureInvalid => "token_signature_invalid",
            TokenError::Expired => "token_expired",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("token signing failed: {0}")]
pub struct SigningError(String);

impl SigningError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub const DEFAULT_TTL_MINUTES: i64 = 24 * 60;

    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();

        // Expiry is checked against the caller's clock in `validate_claims`,
        // not by the library's wall clock with leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user` valid from now for the configured lifetime.
    pub fn sign(&self, user: UserId) -> Result<String, SigningError> {
        self.sign_at(user, Utc::now())
    }

    /// Issue a token as if the clock read `now`. Same key + same `now` ⇒ same token.
    pub fn sign_at(&self, user: UserId, now: DateTime<Utc>) -> Result<String, SigningError> {
        let claims = TokenClaims::new(user, now, self.ttl)?;
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SigningError(e.to_string()))
    }

    /// Verify a token against the wall clock.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Verify signature, decode claims and check expiry against `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                let err = classify(e.kind());
                debug!(reason = err.code(), "token rejected");
                err
            })?;

        validate_claims(&data.claims, now).inspect_err(|e| {
            debug!(reason = e.code(), sub = %data.claims.sub, "token rejected");
        })?;

        Ok(Identity::verified(data.claims.sub))
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
