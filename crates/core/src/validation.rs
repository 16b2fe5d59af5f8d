//! Request validation helpers.
//!
//! DTOs implement [`Validate`] by feeding their fields through a [`Violations`]
//! collector. Every violation is reported at once as a single 400 protocol
//! error whose message is the list of violations.

use crate::error::ProtocolError;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 255;
/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validation of a deserialized request payload.
pub trait Validate {
    fn validate(&self) -> Result<(), ProtocolError>;
}

/// Collects field violations in declaration order.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unconditionally.
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Record `message` when `failed` holds.
    pub fn check(&mut self, failed: bool, message: impl FnOnce() -> String) -> &mut Self {
        if failed {
            self.0.push(message());
        }
        self
    }

    /// Non-blank string of at most `max` characters.
    pub fn required_text(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.trim().is_empty() {
            self.push(format!("{field} should not be empty"));
        } else if value.chars().count() > max {
            self.push(format!("{field} must be at most {max} characters"));
        }
        self
    }

    /// Like [`Self::required_text`] but only when the field is present.
    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            self.required_text(field, value, max);
        }
        self
    }

    /// Integer within `min..=max`.
    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min {
            self.push(format!("{field} must not be less than {min}"));
        } else if value > max {
            self.push(format!("{field} must not be greater than {max}"));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.len() > MAX_EMAIL_LENGTH {
            self.push(format!(
                "{field} must not exceed {MAX_EMAIL_LENGTH} characters"
            ));
        } else if !is_email(value) {
            self.push(format!("{field} must be an email"));
        }
        self
    }

    /// At least [`MIN_PASSWORD_LENGTH`] characters with a letter and a digit.
    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        if value.chars().count() < MIN_PASSWORD_LENGTH {
            self.push(format!(
                "{field} must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
        } else if !value.chars().any(char::is_alphabetic)
            || !value.chars().any(|c| c.is_ascii_digit())
        {
            self.push(format!(
                "{field} must contain at least one letter and one number"
            ));
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finish: `Ok` when nothing was recorded.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::bad_request(self.0))
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorMessage;

    use super::*;

    #[test]
    fn collects_every_violation() {
        let mut v = Violations::new();
        v.required_text("name", "  ", 10)
            .range("age", 31, 0, 30)
            .email("email", "nobody");
        let err = v.finish().unwrap_err();
        assert_eq!(
            err.message(),
            &ErrorMessage::Many(vec![
                "name should not be empty".to_string(),
                "age must not be greater than 30".to_string(),
                "email must be an email".to_string(),
            ])
        );
    }

    #[test]
    fn empty_collector_passes() {
        let mut v = Violations::new();
        v.required_text("name", "Tom", 10).range("age", 3, 0, 30);
        assert!(v.is_empty());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn email_validation() {
        assert!(is_email("user@example.com"));
        assert!(is_email("test.user@domain.org"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("user@"));
        assert!(!is_email("nodomain"));
        assert!(!is_email("a b@example.com"));
    }

    #[test]
    fn password_validation() {
        let check = |p: &str| {
            let mut v = Violations::new();
            v.password("password", p);
            v.is_empty()
        };
        assert!(check("password1"));
        assert!(check("MySecure123"));
        assert!(!check("short1"));
        assert!(!check("onlyletters"));
        assert!(!check("12345678"));
    }

    #[test]
    fn optional_text_skips_absent_values() {
        let mut v = Violations::new();
        v.optional_text("breed", None, 10);
        assert!(v.is_empty());
        v.optional_text("breed", Some(""), 10);
        assert!(!v.is_empty());
    }
}
