//! HS256 session and password-reset tokens.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CryptoError, CryptoResult};

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Password reset token lifetime.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Purpose of a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token so two tokens issued in the same second differ.
    pub jti: Uuid,
}

/// Claims carried by password-reset tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
            reset_ttl: RESET_TOKEN_TTL,
        }
    }

    /// Override token lifetimes.
    pub fn with_ttls(mut self, access: Duration, refresh: Duration, reset: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self.reset_ttl = reset;
        self
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn reset_ttl(&self) -> Duration {
        self.reset_ttl
    }

    /// Issue a session token of the given kind.
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> CryptoResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            kind,
            iat: now,
            exp: now + self.ttl(kind).as_secs() as i64,
            jti: Uuid::new_v4(),
        };
        self.sign(&claims)
    }

    /// Issue an access token and a refresh token.
    pub fn issue_pair(&self, user_id: Uuid) -> CryptoResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenKind::Access)?,
            refresh_token: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Verify a session token and check its kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> CryptoResult<Claims> {
        let claims: Claims = self.decode_claims(token)?;
        if claims.kind != expected {
            return Err(CryptoError::WrongTokenKind {
                expected: expected.as_str(),
                actual: claims.kind.as_str(),
            });
        }
        Ok(claims)
    }

    /// Issue a password-reset token bound to an email address.
    pub fn issue_reset(&self, email: &str) -> CryptoResult<String> {
        let now = Utc::now().timestamp();
        let claims = ResetClaims {
            email: email.to_string(),
            iat: now,
            exp: now + self.reset_ttl.as_secs() as i64,
        };
        self.sign(&claims)
    }

    /// Verify a password-reset token, returning the email it was issued for.
    pub fn verify_reset(&self, token: &str) -> CryptoResult<String> {
        let claims: ResetClaims = self.decode_claims(token)?;
        Ok(claims.email)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> CryptoResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> CryptoResult<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
                _ => CryptoError::TokenInvalid(e.to_string()),
            })
    }
}
