use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::{Role, User};
use crate::error::{AppError, UnauthenticatedReason};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub kind: TokenKind,
    /// Unique per token so two pairs minted in the same second still differ.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature or format is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::unauthenticated(UnauthenticatedReason::TokenInvalid),
            TokenError::Expired => AppError::unauthenticated(UnauthenticatedReason::TokenExpired),
            TokenError::Signing(msg) => AppError::InternalError(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_secret: String,
    pub refresh_ttl_secs: i64,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AppError::ConfigError("token secrets must not be empty".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AppError::ConfigError(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            return Err(AppError::ConfigError("token lifetimes must be positive".into()));
        }
        if self.access_secret.len() < 32 || self.refresh_secret.len() < 32 {
            tracing::warn!("token secrets are shorter than the recommended 32 bytes");
        }
        Ok(())
    }
}

impl From<&AuthConfig> for TokenConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_secret: config.refresh_token_secret.clone(),
            refresh_ttl_secs: config.refresh_token_ttl_secs,
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KeyPair {
    fn from_secret(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

/// Signs and verifies access and refresh tokens, each class under its own key.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Result<Self, AppError> {
        config.validate()?;

        // Expiry is checked by hand in `verify_at` so the boundary is exact.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            access: KeyPair::from_secret(&config.access_secret, config.access_ttl_secs),
            refresh: KeyPair::from_secret(&config.refresh_secret, config.refresh_ttl_secs),
            validation,
        })
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access.ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh.ttl_secs
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, TokenError> {
        self.issue_access_token_at(user, Utc::now().timestamp())
    }

    pub fn issue_access_token_at(&self, user: &User, now: i64) -> Result<String, TokenError> {
        self.sign(TokenKind::Access, user.id, Some(user.role), now)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_refresh_token_at(user_id, Utc::now().timestamp())
    }

    pub fn issue_refresh_token_at(&self, user_id: Uuid, now: i64) -> Result<String, TokenError> {
        self.sign(TokenKind::Refresh, user_id, None, now)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.issue_access_token_at(user, now)?,
            refresh_token: self.issue_refresh_token_at(user.id, now)?,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, kind, Utc::now().timestamp())
    }

    /// Checks the signature with the key for `kind`, then the expiry.
    /// A token is live strictly before `exp`; at `exp` it is already expired.
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign(&self, kind: TokenKind, sub: Uuid, role: Option<Role>, now: i64) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims {
            sub,
            role,
            kind,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + keys.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
