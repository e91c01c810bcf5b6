//! Access and refresh token signing.
//!
//! Both token kinds are HS256 JWTs carrying only the user id. Each kind has
//! its own secret, so a leaked access secret cannot mint refresh tokens and
//! the other way round. Nothing is stored server side: a refresh token stays
//! usable until it expires, however often it is presented.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Access,
    Refresh,
}

impl KeyClass {
    pub fn ttl(&self) -> Duration {
        match self {
            KeyClass::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            KeyClass::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyClass::Access => f.write_str("access"),
            KeyClass::Refresh => f.write_str("refresh"),
        }
    }
}

/// Verification failures stay distinct for logs and tests. Callers collapse
/// them into one client-facing error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token malformed")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Subject recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token one second past `exp` is rejected.
        validation.leeway = 0;

        Self {
            access: SigningKeys::from_secret(access_secret),
            refresh: SigningKeys::from_secret(refresh_secret),
            validation,
        }
    }

    fn keys(&self, class: KeyClass) -> &SigningKeys {
        match class {
            KeyClass::Access => &self.access,
            KeyClass::Refresh => &self.refresh,
        }
    }

    pub fn issue_access(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_at(KeyClass::Access, user_id, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_at(KeyClass::Refresh, user_id, Utc::now())
    }

    /// Sign a token as if it had been issued at `issued_at`.
    pub fn issue_at(
        &self,
        class: KeyClass,
        user_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp().max(0) as usize,
            exp: (issued_at + class.ttl()).timestamp().max(0) as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(class).encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str, class: KeyClass) -> Result<VerifiedToken, TokenError> {
        let data = decode::<Claims>(token, &self.keys(class).decoding, &self.validation)?;

        if data.claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }

        Ok(VerifiedToken {
            subject: data.claims.sub,
        })
    }
}
