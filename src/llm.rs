//! The external conversion collaborator: trait + OpenAI-compatible client.
//!
//! The pipeline never depends on a concrete model or provider. It requires
//! exactly one capability — `cleaned HTML in, Markdown out` — expressed by
//! [`HtmlConverter`]. The shipped implementation, [`OpenAiChatClient`],
//! speaks the OpenAI `/chat/completions` wire format, which covers OpenAI,
//! DeepSeek, and every compatible self-hosted endpoint.
//!
//! Retry and timeout policy deliberately do NOT live here: the orchestrator
//! owns them (see [`crate::pipeline::convert`]), so swapping the transport
//! never changes retry behaviour. This module only classifies failures via
//! [`ConvertError::is_transient`] so the orchestrator can decide what is
//! worth retrying.

use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default chat-completions endpoint (the DeepSeek API).
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// An error from a single conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 — back off before retrying.
    #[error("rate limited (retry-after: {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The API returned a well-formed response with no content.
    #[error("API returned an empty completion")]
    Empty,
}

impl ConvertError {
    /// Whether the orchestrator should retry this failure.
    ///
    /// Transport failures, rate limits, and 5xx responses are transient.
    /// Client errors (bad API key, malformed request) are not — retrying
    /// would only repeat the same answer slower.
    pub fn is_transient(&self) -> bool {
        match self {
            ConvertError::Transport(_) => true,
            ConvertError::RateLimited { .. } => true,
            ConvertError::Api { status, .. } => *status >= 500,
            ConvertError::Empty => true,
        }
    }
}

/// The synchronous request/response contract the pipeline depends on.
///
/// Implementations must be `Send + Sync`: documents are converted
/// concurrently and share one converter behind an `Arc`. The only behaviour
/// the pipeline requires beyond "produce Markdown" is that local image
/// references in the input HTML are echoed verbatim into the output's image
/// syntax — the rewriter matches on the original reference text.
#[async_trait]
pub trait HtmlConverter: Send + Sync {
    /// Convert one cleaned HTML document to Markdown.
    async fn convert(&self, html: &str) -> Result<String, ConvertError>;
}

// ── OpenAI-compatible client ─────────────────────────────────────────────

/// An [`HtmlConverter`] speaking the OpenAI chat-completions protocol.
///
/// Built from [`crate::config::ConversionConfig`] by the orchestrator, or
/// directly for library use:
///
/// ```rust,no_run
/// use snap2md::OpenAiChatClient;
///
/// let client = OpenAiChatClient::new("sk-...")
///     .with_model("deepseek-chat")
///     .with_api_base("https://api.deepseek.com");
/// ```
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
}

impl OpenAiChatClient {
    /// Create a client with default endpoint, model, and sampling settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 8192,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = trim_trailing_slash(base.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl HtmlConverter for OpenAiChatClient {
    async fn convert(&self, html: &str) -> Result<String, ConvertError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Convert the following HTML to Markdown:\n\n{html}"),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        debug!("POST {} ({} bytes of HTML)", url, html.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConvertError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ConvertError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConvertError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ConvertError::Transport(format!("malformed response body: {e}")))?;

        match parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(ConvertError::Empty),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
