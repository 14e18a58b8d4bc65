//! Authentication and authorization utilities
//!
//! Provides:
//! - Password hashing (argon2)
//! - JWT token generation and validation
//! - One-time token generation for password resets and invitations
//! - Member roles and what each role may see
//! - Authenticated context extraction

use crate::constants::CacheNamespace;
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Role of a member inside a company
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "MEMBER")]
    Member,
    #[sea_orm(string_value = "STOCKIST")]
    Stockist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Stockist => "STOCKIST",
        }
    }

    /// Company settings, members and stores
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Stockists only see inventory
    pub fn can_view(&self, namespace: CacheNamespace) -> bool {
        match self {
            Role::Admin | Role::Member => true,
            Role::Stockist => namespace == CacheNamespace::Inventory,
        }
    }

    /// Require one of `allowed`
    pub fn require(&self, allowed: &[Role]) -> Result<()> {
        if allowed.contains(self) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Role {} is not allowed to perform this action", self),
            })
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            "STOCKIST" => Ok(Role::Stockist),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Extracted authentication context available to handlers
///
/// Carries identity only; roles are re-read from the database by the
/// handlers so a demoted member loses access immediately.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user
    pub user_id: Uuid,

    /// Company the token was issued for
    pub tenant_id: Uuid,

    /// Request ID for tracing
    pub request_id: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Tenant ID
    pub tenant_id: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
    remember_me_expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64, remember_me_expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
            remember_me_expiration_secs: remember_me_expiration_secs as i64,
        }
    }

    /// Lifetime of a token in seconds
    pub fn lifetime_secs(&self, remember_me: bool) -> i64 {
        if remember_me {
            self.remember_me_expiration_secs
        } else {
            self.expiration_secs
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, tenant_id: Uuid, remember_me: bool) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs(remember_me));

        let claims = JwtClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Generate a new one-time token (reset links, invitations)
pub fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Hash a one-time token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        let tenant_id = Uuid::parse_str(&claims.tenant_id).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthContext {
            user_id,
            tenant_id,
            request_id,
        })
    }
}
