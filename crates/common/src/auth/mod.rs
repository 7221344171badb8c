//! Authentication and authorization utilities
//!
//! Provides:
//! - Roles and the explicit caller identity every workflow operation takes
//! - JWT token generation and validation
//! - Caller extraction for axum handlers

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Role of an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Default role; authors submit papers
    #[serde(alias = "AUTHOR")]
    User,
    Reviewer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Reviewer => "REVIEWER",
            Role::Admin => "ADMIN",
        }
    }

    /// Roles that may be allocated as a paper's reviewer
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Reviewer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" | "AUTHOR" => Ok(Role::User),
            "REVIEWER" => Ok(Role::Reviewer),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::validation("role", format!("Unknown role: {}", other))),
        }
    }
}

/// Identity of whoever invokes a workflow operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the admin role, returning error if not present
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Only an admin may {}", action)))
        }
    }
}

/// A registered user as seen by the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Role at issue time
    pub role: Role,

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
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e)
            })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::ExpiredToken
                    }
                    _ => AppError::InvalidToken,
                }
            })
    }

    /// Resolve a token to the caller it identifies
    pub fn resolve(&self, token: &str) -> Result<Caller> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        Ok(Caller::new(user_id, claims.role))
    }
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for Caller
impl<S> FromRequestParts<S> for Caller
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use the Bearer scheme".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let caller = jwt.resolve(token)?;

        tracing::debug!(user_id = %caller.user_id, role = %caller.role, "Caller authenticated");
        Ok(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_values() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("AUTHOR".parse::<Role>().unwrap(), Role::User);
        assert!("EDITOR".parse::<Role>().is_err());
        assert_eq!(serde_json::from_str::<Role>("\"AUTHOR\"").unwrap(), Role::User);
        assert_eq!(serde_json::to_string(&Role::Reviewer).unwrap(), "\"REVIEWER\"");
    }

    #[test]
    fn test_reviewer_eligibility() {
        assert!(Role::Reviewer.can_review());
        assert!(Role::Admin.can_review());
        assert!(!Role::User.can_review());
    }

    #[test]
    fn test_require_admin() {
        let admin = Caller::new(Uuid::new_v4(), Role::Admin);
        let author = Caller::new(Uuid::new_v4(), Role::User);
        assert!(admin.require_admin("assign reviewers").is_ok());
        assert!(matches!(
            author.require_admin("assign reviewers"),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer   "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id, Role::Reviewer).unwrap();
        let caller = manager.resolve(&token).unwrap();

        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.role, Role::Reviewer);
    }

    #[test]
    fn test_jwt_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);
        let token = issuer.generate_token(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(matches!(verifier.resolve(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_jwt_expired_rejected() {
        // Past the default 60s leeway
        let manager = JwtManager::new("test_secret", 0);
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::User,
            exp: Utc::now().timestamp() - 600,
            iat: Utc::now().timestamp() - 1200,
        };
        let token = encode(&Header::default(), &claims, &manager.encoding_key).unwrap();
        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }
}
