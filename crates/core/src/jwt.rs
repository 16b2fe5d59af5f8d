//! JWT issuance, validation and the authenticated-user context.
//!
//! Keys are derived once from the configured secret and shared through
//! [`JwtValidator`]. This module knows nothing about storage: implement
//! [`JwtSubject`] for the user type that should receive tokens.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use chrono::{Duration, Utc};
use http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BusinessError, Fault, ProtocolError};

/// JWT issuer identifier.
const ISSUER: &str = "cats-service";
/// JWT audience identifier.
const AUDIENCE: &str = "cats-service";

/// Message used when a guarded route runs without an authenticated user.
pub const MISSING_USER_MESSAGE: &str = "User context is missing, check the token pipeline";
/// Message used when the user lacks every required role.
pub const ROLE_DENIED_MESSAGE: &str = "Access to this resource is forbidden";

/// Types that can be the subject of an access token.
pub trait JwtSubject {
    fn user_id(&self) -> i32;
    fn email(&self) -> &str;
    fn username(&self) -> &str;
    /// Role codes, e.g. `user`, `super-admin`.
    fn roles(&self) -> &[String];
}

/// Authenticated user, injected into request extensions by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Require at least one of `roles`. An empty list admits everyone.
    pub fn require_any_role(&self, roles: &[&str]) -> Result<(), BusinessError> {
        if roles.is_empty() || roles.iter().any(|role| self.has_role(role)) {
            return Ok(());
        }
        warn!(user_id = self.id, required = ?roles, held = ?self.roles, "Role check failed");
        Err(BusinessError::forbidden().with_message(ROLE_DENIED_MESSAGE))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = Fault;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ProtocolError::forbidden(MISSING_USER_MESSAGE).into())
    }
}

/// A fixed set of roles, any one of which admits a request.
pub trait RoleSet {
    const ROLES: &'static [&'static str];
}

/// [`AuthUser`] that holds one of `R::ROLES`.
///
/// Place it before any body, path or query extractor: the role check then
/// answers before payload validation does.
#[derive(Debug, Clone)]
pub struct Authorized<R> {
    pub user: AuthUser,
    roles: PhantomData<R>,
}

impl<S: Send + Sync, R: RoleSet> FromRequestParts<S> for Authorized<R> {
    type Rejection = Fault;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_any_role(R::ROLES)?;
        Ok(Self {
            user,
            roles: PhantomData,
        })
    }
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,

    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
}

/// JWT validation errors.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid authorization format")]
    InvalidFormat,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TryFrom<Claims> for AuthUser {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims
                .sub
                .parse()
                .map_err(|_| JwtError::InvalidClaim("sub"))?,
            email: claims.email,
            username: claims.username,
            roles: claims.roles,
        })
    }
}

/// Shared HS256 signer/validator with cached keys.
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret_bytes)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret_bytes)),
            validation,
        }
    }

    /// Sign an access token for `subject`, valid for `ttl_minutes`.
    pub fn generate_access_token<T: JwtSubject>(
        &self,
        subject: &T,
        ttl_minutes: u64,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let ttl = i64::try_from(ttl_minutes).unwrap_or(i64::MAX / 60);
        let expiration = now + Duration::minutes(ttl);

        let claims = Claims {
            sub: subject.user_id().to_string(),
            aud: AUDIENCE.to_string(),
            iss: ISSUER.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            email: subject.email().to_string(),
            username: subject.username().to_string(),
            roles: subject.roles().to_vec(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(JwtError::Signing)
    }

    /// Validate a token and extract the user it was issued to.
    pub fn validate(&self, token: &str) -> Result<AuthUser, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::InvalidToken)?;

        token_data.claims.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestUser {
        id: i32,
        email: String,
        username: String,
        roles: Vec<String>,
    }

    impl JwtSubject for TestUser {
        fn user_id(&self) -> i32 {
            self.id
        }
        fn email(&self) -> &str {
            &self.email
        }
        fn username(&self) -> &str {
            &self.username
        }
        fn roles(&self) -> &[String] {
            &self.roles
        }
    }

    fn test_user() -> TestUser {
        TestUser {
            id: 7,
            email: "tom@example.com".to_string(),
            username: "tom".to_string(),
            roles: vec!["user".to_string()],
        }
    }

    fn test_secret() -> SecretString {
        SecretString::from("test_secret_key_minimum_32_chars!")
    }

    #[test]
    fn generate_and_validate_access_token() {
        let validator = JwtValidator::new(&test_secret());
        let token = validator.generate_access_token(&test_user(), 15).unwrap();

        let user = validator.validate(&token).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.email, "tom@example.com");
        assert_eq!(user.username, "tom");
        assert_eq!(user.roles, vec!["user".to_string()]);
    }

    #[test]
    fn token_from_other_secret_rejected() {
        let issuer = JwtValidator::new(&SecretString::from("another_secret_key_with_32_chars!!"));
        let token = issuer.generate_access_token(&test_user(), 15).unwrap();
        let validator = JwtValidator::new(&test_secret());
        assert!(matches!(
            validator.validate(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn invalid_token_rejected() {
        let validator = JwtValidator::new(&test_secret());
        assert!(validator.validate("invalid.token.here").is_err());
    }

    #[test]
    fn role_check() {
        let admin = AuthUser {
            id: 1,
            email: "admin@example.com".to_string(),
            username: "admin".to_string(),
            roles: vec!["super-admin".to_string()],
        };
        assert!(admin.require_any_role(&["user", "super-admin"]).is_ok());
        assert!(admin.require_any_role(&[]).is_ok());

        let err = admin.require_any_role(&["auditor"]).unwrap_err();
        assert_eq!(err.business_code(), 403);
        assert_eq!(err.message(), ROLE_DENIED_MESSAGE);
    }

    #[derive(Debug)]
    struct Admins;

    impl RoleSet for Admins {
        const ROLES: &'static [&'static str] = &["super-admin"];
    }

    #[tokio::test]
    async fn authorized_checks_roles() {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.extensions.insert(AuthUser {
            id: 7,
            email: "tom@example.com".to_string(),
            username: "tom".to_string(),
            roles: vec!["user".to_string()],
        });
        let rejection = Authorized::<Admins>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(rejection, Fault::Business(err) if err.business_code() == 403));

        parts.extensions.insert(AuthUser {
            id: 1,
            email: "admin@example.com".to_string(),
            username: "admin".to_string(),
            roles: vec!["super-admin".to_string()],
        });
        let Authorized { user, .. } = Authorized::<Admins>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn extractor_rejects_missing_user() {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        let rejection = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(rejection, Fault::Protocol(err) if err.status() == http::StatusCode::FORBIDDEN));
    }
}
