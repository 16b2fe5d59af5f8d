//! AI request payloads.

use cats_core::{ProtocolError, Validate, Violations};
use serde::Deserialize;

/// Maximum accepted prompt input, in characters.
pub const MAX_INPUT_LENGTH: usize = 20_000;

fn default_target_language() -> String {
    "Chinese".to_string()
}

fn default_code_language() -> String {
    "TypeScript".to_string()
}

/// `POST /ai/chat` and `POST /ai/chat/template` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatDto {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl Validate for ChatDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("message", &self.message, MAX_INPUT_LENGTH)
            .optional_text("context", self.context.as_deref(), MAX_INPUT_LENGTH);
        v.finish()
    }
}

/// `GET /ai/chat/stream` query.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub message: String,
}

impl Validate for StreamQuery {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("message", &self.message, MAX_INPUT_LENGTH);
        v.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeDto {
    pub text: String,
}

impl Validate for SummarizeDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("text", &self.text, MAX_INPUT_LENGTH);
        v.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateDto {
    pub text: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Validate for TranslateDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("text", &self.text, MAX_INPUT_LENGTH)
            .required_text("targetLanguage", &self.target_language, 50);
        v.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeExplainDto {
    pub code: String,
    #[serde(default = "default_code_language")]
    pub language: String,
}

impl Validate for CodeExplainDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("code", &self.code, MAX_INPUT_LENGTH)
            .required_text("language", &self.language, 50);
        v.finish()
    }
}
