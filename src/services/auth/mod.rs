//! Registration, login and email captcha.
//!
//! Organized by concern:
//! - `mod.rs` - `AuthService` and the business rules
//! - `dto.rs` - request and response payloads
//! - `handlers.rs` - axum handlers
//! - `password.rs` - Argon2id hashing

mod dto;
mod handlers;
mod password;

use std::sync::Arc;

use cats_core::{BusinessError, Fault, FaultExt, JwtValidator, ProtocolError};
use cats_db::{DbError, NewUser, User, UserRepository, UserWithRoles, roles};
use cats_email::EmailService;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, error, info, warn};

pub use dto::{EmailQuery, LoginDto, RegisterDto, TokenResponse};
pub use handlers::router;

/// Business code for a duplicate registration.
pub const USER_EXISTS_CODE: i64 = 1001;
/// Business code for a missing default role.
pub const ROLE_MISSING_CODE: i64 = 1002;
/// Message for any failed login, so callers cannot tell which part was wrong.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
/// Token type reported on login.
pub const TOKEN_TYPE: &str = "Bearer";

const CAPTCHA_LENGTH: usize = 8;
const WELCOME_SUBJECT: &str = "Welcome to cats-service";

/// Auth business rules over a [`UserRepository`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtValidator,
    access_token_ttl_minutes: u64,
    email: Option<EmailService>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("email", &self.email.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt: JwtValidator,
        access_token_ttl_minutes: u64,
        email: Option<EmailService>,
    ) -> Self {
        Self {
            users,
            jwt,
            access_token_ttl_minutes,
            email,
        }
    }

    /// Register a user with the default `user` role.
    pub async fn register(&self, dto: RegisterDto) -> Result<User, Fault> {
        let email = dto.email.trim().to_lowercase();
        let username = dto.username.trim().to_string();

        if self.users.find_by_email(&email).await?.is_some()
            || self.users.find_by_username(&username).await?.is_some()
        {
            debug!(email = %email, "Registration for existing user");
            return Err(user_exists());
        }

        let role = self
            .users
            .find_role_by_code(roles::USER)
            .await?
            .ok_or_else(|| {
                error!(role = roles::USER, "Default role is not seeded");
                BusinessError::custom(ROLE_MISSING_CODE, "Default user role is not configured")
            })?;

        let password_hash = password::hash(&dto.password)
            .await
            .or_unknown("Failed to hash password")?;

        let user = self
            .users
            .create_with_role(
                NewUser {
                    username,
                    email,
                    password_hash,
                },
                role.id,
            )
            .await
            .map_err(|e| match e {
                DbError::Duplicate(column) => {
                    debug!(column, "Registration lost a race on a unique column");
                    user_exists()
                }
                other => other.into(),
            })?;

        info!(user_id = user.id, "User registered");
        self.send_welcome(&user);
        Ok(user)
    }

    /// Check credentials and issue an access token.
    pub async fn login(&self, dto: LoginDto) -> Result<TokenResponse, Fault> {
        let email = dto.email.trim().to_lowercase();

        let Some(user) = self.users.find_by_email(&email).await? else {
            debug!(email = %email, "Login for unknown email");
            return Err(invalid_credentials());
        };

        let matched = password::verify(&dto.password, &user.password)
            .await
            .or_unknown("Failed to verify password")?;
        if !matched {
            warn!(user_id = user.id, "Invalid password");
            return Err(invalid_credentials());
        }

        let roles = self.users.roles_for(user.id).await?;
        let subject = UserWithRoles { user, roles };

        let access_token = self
            .jwt
            .generate_access_token(&subject, self.access_token_ttl_minutes)
            .or_unknown("Failed to sign access token")?;

        info!(user_id = subject.user.id, "User logged in");
        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE,
            expires_in: self.access_token_ttl_minutes.saturating_mul(60),
        })
    }

    /// Email a fresh captcha to `email`.
    pub async fn send_email_captcha(&self, email: &str) -> Result<(), Fault> {
        let service = self.email.as_ref().ok_or_else(|| {
            ProtocolError::service_unavailable("Email service is not configured")
        })?;

        let captcha = generate_captcha();
        service
            .send_captcha(email, &captcha)
            .await
            .or_unknown("Failed to send captcha email")?;

        info!(email = %email, "Captcha email sent");
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        self.users.health_check().await
    }

    /// Fire-and-forget welcome email; registration never waits on SMTP.
    fn send_welcome(&self, user: &User) {
        let Some(service) = self.email.clone() else {
            return;
        };
        let to = user.email.clone();
        let body = format!(
            "Hello {}, your cats-service account is ready.",
            user.username
        );
        tokio::spawn(async move {
            if let Err(e) = service.send_email(&to, WELCOME_SUBJECT, &body).await {
                warn!(error = %e, "Failed to send welcome email");
            }
        });
    }
}

fn user_exists() -> Fault {
    BusinessError::custom(USER_EXISTS_CODE, "User already exists").into()
}

fn invalid_credentials() -> Fault {
    BusinessError::unauthorized()
        .with_message(INVALID_CREDENTIALS_MESSAGE)
        .into()
}

fn generate_captcha() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CAPTCHA_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cats_db::{MemoryUserRepository, Role};
    use secrecy::SecretString;

    use super::*;

    /// Lookups never find a user, as when a concurrent registration commits
    /// between the lookup and the insert.
    struct StaleLookups(MemoryUserRepository);

    #[async_trait]
    impl UserRepository for StaleLookups {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, DbError> {
            Ok(None)
        }
        async fn find_by_username(&self, _username: &str) -> Result<Option<User>, DbError> {
            Ok(None)
        }
        async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, DbError> {
            self.0.find_role_by_code(code).await
        }
        async fn create_with_role(&self, user: NewUser, role_id: i32) -> Result<User, DbError> {
            self.0.create_with_role(user, role_id).await
        }
        async fn roles_for(&self, user_id: i32) -> Result<Vec<String>, DbError> {
            self.0.roles_for(user_id).await
        }
        async fn health_check(&self) -> bool {
            true
        }
    }

    fn validator() -> JwtValidator {
        JwtValidator::new(&SecretString::from("test_secret_key_minimum_32_chars!"))
    }

    fn service_with(users: MemoryUserRepository) -> AuthService {
        AuthService::new(Arc::new(users), validator(), 60, None)
    }

    fn register_dto(email: &str) -> RegisterDto {
        RegisterDto {
            username: "tom".to_string(),
            email: email.to_string(),
            password: "whiskers123".to_string(),
            captcha: None,
        }
    }

    fn business_code(fault: Fault) -> i64 {
        match fault {
            Fault::Business(err) => err.business_code(),
            other => panic!("expected business fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let service = service_with(MemoryUserRepository::new());
        let user = service.register(register_dto("Tom@Example.com")).await.unwrap();
        assert_eq!(user.email, "tom@example.com");
        assert_ne!(user.password, "whiskers123");

        let token = service
            .login(LoginDto {
                email: "tom@example.com".to_string(),
                password: "whiskers123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let auth = validator().validate(&token.access_token).unwrap();
        assert_eq!(auth.id, user.id);
        assert_eq!(auth.roles, vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_registration_is_1001() {
        let service = service_with(MemoryUserRepository::new());
        service.register(register_dto("tom@example.com")).await.unwrap();
        let err = service
            .register(register_dto("tom@example.com"))
            .await
            .unwrap_err();
        assert_eq!(business_code(err), USER_EXISTS_CODE);
    }

    #[tokio::test]
    async fn duplicate_missed_by_lookup_is_still_1001() {
        let service = AuthService::new(
            Arc::new(StaleLookups(MemoryUserRepository::new())),
            validator(),
            60,
            None,
        );
        service.register(register_dto("tom@example.com")).await.unwrap();

        let same_email = service
            .register(register_dto("tom@example.com"))
            .await
            .unwrap_err();
        assert_eq!(business_code(same_email), USER_EXISTS_CODE);

        // register_dto always uses the username "tom".
        let same_username = service
            .register(register_dto("other@example.com"))
            .await
            .unwrap_err();
        assert_eq!(business_code(same_username), USER_EXISTS_CODE);
    }

    #[tokio::test]
    async fn missing_default_role_is_1002() {
        let service = service_with(MemoryUserRepository::without_roles());
        let err = service
            .register(register_dto("tom@example.com"))
            .await
            .unwrap_err();
        assert_eq!(business_code(err), ROLE_MISSING_CODE);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let service = service_with(MemoryUserRepository::new());
        service.register(register_dto("tom@example.com")).await.unwrap();

        for (email, password) in [
            ("tom@example.com", "not-the-one1"),
            ("nobody@example.com", "whiskers123"),
        ] {
            let err = service
                .login(LoginDto {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await
                .unwrap_err();
            let Fault::Business(err) = err else {
                panic!("expected business fault");
            };
            assert_eq!(err.business_code(), 401);
            assert_eq!(err.message(), INVALID_CREDENTIALS_MESSAGE);
        }
    }

    #[tokio::test]
    async fn captcha_without_email_service_is_unavailable() {
        let service = service_with(MemoryUserRepository::new());
        let err = service
            .send_email_captcha("tom@example.com")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Fault::Protocol(e) if e.status() == http::StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[test]
    fn captcha_is_alphanumeric() {
        let captcha = generate_captcha();
        assert_eq!(captcha.len(), CAPTCHA_LENGTH);
        assert!(captcha.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
