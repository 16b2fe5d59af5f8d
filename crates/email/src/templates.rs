//! Email bodies.

/// Registration captcha email.
pub struct CaptchaEmail<'a> {
    pub captcha: &'a str,
}

impl CaptchaEmail<'_> {
    pub const SUBJECT: &'static str = "Email Captcha";

    #[must_use]
    pub fn render_text(&self) -> String {
        format!("Your email captcha is: {}", self.captcha)
    }

    #[must_use]
    pub fn render_html(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{subject}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <p>Your email captcha is:</p>
    <p style="font-size: 24px; font-weight: 600; letter-spacing: 4px;">{captcha}</p>
    <p style="color: #666; font-size: 12px;">If you did not request this code, you can ignore this email.</p>
</body>
</html>"#,
            subject = Self::SUBJECT,
            captcha = self.captcha,
        )
    }
}
