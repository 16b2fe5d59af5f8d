//! Text generation endpoints backed by an OpenAI-compatible provider.
//!
//! Organized by concern:
//! - `mod.rs` - `AiService` and the prompt templates
//! - `client.rs` - HTTP client for chat completions
//! - `dto.rs` - request payloads
//! - `handlers.rs` - axum handlers, including the SSE stream

mod client;
mod dto;
mod handlers;

use cats_core::{Fault, FaultExt, ProtocolError};
use tracing::info;

pub use client::{
    ChatClient, ChatConfig, ChatError, ChatStream, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    SseLine, parse_sse_line,
};
pub use dto::{ChatDto, CodeExplainDto, StreamQuery, SummarizeDto, TranslateDto};
pub use handlers::router;

/// Context used by the templated chat when the caller gives none.
pub const DEFAULT_CONTEXT: &str = "No additional context provided.";

const NOT_CONFIGURED: &str = "AI service is not configured";

/// Prompt construction around an optional [`ChatClient`].
#[derive(Debug, Clone, Default)]
pub struct AiService {
    client: Option<ChatClient>,
}

impl AiService {
    #[must_use]
    pub const fn new(client: Option<ChatClient>) -> Self {
        Self { client }
    }

    fn client(&self) -> Result<&ChatClient, Fault> {
        self.client
            .as_ref()
            .ok_or_else(|| ProtocolError::service_unavailable(NOT_CONFIGURED).into())
    }

    pub async fn chat(&self, message: &str) -> Result<String, Fault> {
        let client = self.client()?;
        info!(message_len = message.len(), "Processing chat message");
        client.complete(message).await.or_unknown("Chat failed")
    }

    pub async fn chat_with_template(
        &self,
        topic: &str,
        context: Option<&str>,
    ) -> Result<String, Fault> {
        let client = self.client()?;
        info!(has_context = context.is_some(), "Processing templated chat");
        client
            .complete(&template_prompt(topic, context))
            .await
            .or_unknown("Templated chat failed")
    }

    pub async fn summarize(&self, text: &str) -> Result<String, Fault> {
        let client = self.client()?;
        info!(text_len = text.len(), "Summarizing text");
        client
            .complete(&summarize_prompt(text))
            .await
            .or_unknown("Summarization failed")
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String, Fault> {
        let client = self.client()?;
        info!(target_language, "Translating text");
        client
            .complete(&translate_prompt(text, target_language))
            .await
            .or_unknown("Translation failed")
    }

    pub async fn explain_code(&self, code: &str, language: &str) -> Result<String, Fault> {
        let client = self.client()?;
        info!(language, "Explaining code");
        client
            .complete(&explain_code_prompt(code, language))
            .await
            .or_unknown("Code explanation failed")
    }

    /// Open a streaming chat. Provider failures surface inside the stream.
    pub fn stream(&self, message: &str) -> Result<ChatStream, Fault> {
        let client = self.client()?;
        info!(message_len = message.len(), "Starting stream chat");
        Ok(client.stream(message))
    }
}

fn template_prompt(topic: &str, context: Option<&str>) -> String {
    let context = context
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_CONTEXT);
    format!(
        "You are a helpful assistant.\n{context}\n\nUser's question: {topic}\n\n\
         Please provide a detailed and helpful response."
    )
}

fn summarize_prompt(text: &str) -> String {
    format!("Please summarize the following text concisely:\n\n{text}\n\nSummary:")
}

fn translate_prompt(text: &str, target_language: &str) -> String {
    format!("Translate the following text to {target_language}:\n\n{text}\n\nTranslation:")
}

fn explain_code_prompt(code: &str, language: &str) -> String {
    format!(
        "You are an expert programmer. Please explain the following {language} code:\n\n\
         ```{language}\n{code}\n```\n\n\
         Please provide:\n\
         1. What this code does\n\
         2. Key concepts used\n\
         3. Any potential improvements\n\n\
         Explanation:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_falls_back_to_default_context() {
        let prompt = template_prompt("Why do cats purr?", None);
        assert!(prompt.contains(DEFAULT_CONTEXT));
        assert!(prompt.contains("User's question: Why do cats purr?"));

        let prompt = template_prompt("Why?", Some("Vet answers only."));
        assert!(prompt.contains("Vet answers only."));
        assert!(!prompt.contains(DEFAULT_CONTEXT));
    }

    #[test]
    fn code_prompt_fences_with_language() {
        let prompt = explain_code_prompt("fn main() {}", "Rust");
        assert!(prompt.contains("```Rust\nfn main() {}\n```"));
        assert!(prompt.ends_with("Explanation:"));
    }

    #[test]
    fn translate_prompt_names_target() {
        assert!(translate_prompt("hello", "French").starts_with("Translate the following text to French:"));
        assert!(summarize_prompt("long text").contains("long text"));
    }

    #[tokio::test]
    async fn unconfigured_service_is_unavailable() {
        let service = AiService::default();
        let err = service.chat("hi").await.unwrap_err();
        assert!(
            matches!(err, Fault::Protocol(e) if e.status() == http::StatusCode::SERVICE_UNAVAILABLE)
        );
        assert!(service.stream("hi").is_err());
    }
}
