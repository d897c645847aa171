use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::EntityId;

pub mod password;

pub use password::{PasswordHasher, Sha256PasswordHasher};

/// Long-token claims. `user_key` carries the username for log context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: EntityId,
    pub user_key: String,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    pub fn new(user_id: EntityId, user_key: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            user_key: user_key.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// Issues and verifies bearer credentials. Signing internals stay behind this seam.
#[async_trait]
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: &EntityId, user_key: &str) -> Result<String, TokenError>;

    async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 implementation backed by a shared secret
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: u64,
}

impl JwtTokenService {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        })
    }

    pub fn issue(&self, user_id: &EntityId, user_key: &str) -> Result<String, TokenError> {
        let claims = TokenClaims::new(user_id.clone(), user_key, self.expiry_hours);
        self.issue_claims(&claims)
    }

    pub fn issue_claims(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    fn issue(&self, user_id: &EntityId, user_key: &str) -> Result<String, TokenError> {
        JwtTokenService::issue(self, user_id, user_key)
    }

    async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let validation = Validation::default();

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
