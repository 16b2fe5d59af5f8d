//! Auth request and response payloads.

use cats_core::{ProtocolError, Validate, Violations};
use serde::{Deserialize, Serialize};

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 50;
/// Maximum captcha length accepted on registration.
pub const MAX_CAPTCHA_LENGTH: usize = 16;

/// `POST /auth/register` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDto {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Accepted for client compatibility; not checked against the sent one.
    #[serde(default)]
    pub captcha: Option<String>,
}

impl Validate for RegisterDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("username", &self.username, MAX_USERNAME_LENGTH)
            .email("email", &self.email)
            .password("password", &self.password)
            .optional_text("captcha", self.captcha.as_deref(), MAX_CAPTCHA_LENGTH);
        v.finish()
    }
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

impl Validate for LoginDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.email("email", &self.email).check(self.password.is_empty(), || {
            "password should not be empty".to_string()
        });
        v.finish()
    }
}

/// `GET /auth/email-captcha` query.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

impl Validate for EmailQuery {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.email("email", &self.email);
        v.finish()
    }
}

/// Issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: u64,
}
