//! OpenAI-compatible chat completions client (OpenRouter by default).
//!
//! Two calls are offered: [`ChatClient::complete`] waits for the whole answer,
//! [`ChatClient::stream`] yields content deltas parsed from the provider's
//! server-sent events.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Sampling temperature sent with every request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Completion token limit sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request limit for non-streaming completions.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Stream of content deltas.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Chat client errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("provider returned no content")]
    EmptyResponse,
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API root, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    /// Sent as `HTTP-Referer` for provider attribution.
    pub referer: Option<String>,
    /// Sent as `X-Title`.
    pub app_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Content,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Content,
}

#[derive(Default, Deserialize)]
struct Content {
    #[serde(default)]
    content: Option<String>,
}

/// One line of a server-sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A non-empty content delta.
    Content(String),
    /// The `[DONE]` terminator.
    Done,
    /// Comments, blank lines, other fields and deltas without content.
    Skip,
}

/// Parse one SSE line as sent by OpenAI-compatible providers.
pub fn parse_sse_line(line: &str) -> Result<SseLine, ChatError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map_or(SseLine::Skip, SseLine::Content))
}

/// Shared chat completions client.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: Arc<ChatConfig>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &config.referer {
            headers.insert(
                HeaderName::from_static("http-referer"),
                header_value(referer)?,
            );
        }
        headers.insert(
            HeaderName::from_static("x-title"),
            header_value(&config.app_name)?,
        );

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Chat client initialized"
        );

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Send `prompt` as a single user message and return the full answer.
    #[instrument(skip_all, fields(model = %self.config.model, prompt_len = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let response = self
            .request(prompt, false)
            .timeout(COMPLETION_TIMEOUT)
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        let completion: Completion = serde_json::from_slice(&body)?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ChatError::EmptyResponse)?;

        debug!(answer_len = content.len(), "Completion received");
        Ok(content)
    }

    /// Send `prompt` and yield the answer as it is generated.
    pub fn stream(&self, prompt: &str) -> ChatStream {
        let request = self.request(prompt, true);
        let model = self.config.model.clone();

        let stream = try_stream! {
            debug!(model = %model, "Opening completion stream");
            let response = request.send().await.map_err(ChatError::from)?;
            let mut body = check_status(response).await?.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            'read: while let Some(chunk) = body.next().await {
                buffer.extend_from_slice(&chunk.map_err(ChatError::from)?);

                while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=end).collect();
                    let line = String::from_utf8_lossy(&line);
                    match parse_sse_line(line.trim_end())? {
                        SseLine::Content(text) => yield text,
                        SseLine::Done => break 'read,
                        SseLine::Skip => {}
                    }
                }
            }
            debug!(model = %model, "Completion stream finished");
        };

        Box::pin(stream)
    }

    fn request(&self, prompt: &str, stream: bool) -> RequestBuilder {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        self.http
            .post(url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&ChatRequest {
                model: &self.config.model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                stream,
            })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ChatError> {
    HeaderValue::from_str(value).map_err(|e| ChatError::Config(format!("{value:?}: {e}")))
}

async fn check_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status { status, body })
}
