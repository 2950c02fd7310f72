//! OpenAI-compatible chat-completions generator
//!
//! Sends the description with a system prompt pinning the exact JSON shape,
//! asks for a JSON object response and validates what comes back. Failures
//! are classified so that only timeouts, connection errors, 5xx, 429 and
//! unusable output are retried.

use crate::error::{Result, SurveyError};
use crate::generation::SurveyGenerator;
use crate::retry::RetryPolicy;
use crate::schema::{SchemaViolation, SurveyDocument};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default chat-completions endpoint
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Instructions sent as the system message
pub const SYSTEM_PROMPT: &str = r#"You are an expert survey designer. Create a survey from the user's description.

Return ONLY a JSON object with exactly this structure:
{
  "title": "Survey title",
  "description": "One or two sentences on the survey's purpose",
  "questions": [
    {"type": "singleChoice", "title": "Question text", "options": ["Option A", "Option B"]}
  ]
}

Rules:
- "type" must be one of "multipleChoice", "singleChoice", "openQuestion", "shortAnswer", "scale", "npsScore".
- "options" is required for "multipleChoice" and "singleChoice" and must be omitted for every other type.
- Write 4 to 8 neutral, unbiased questions covering the relevant aspects.
- Write in English."#;

/// Settings for [`LlmSurveyGenerator`]
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for one HTTP attempt
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1200,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::generation(),
        }
    }
}

impl GeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Why one generation attempt failed
#[derive(Debug)]
pub enum GenerationFailure {
    /// The request did not complete in time
    Timeout(String),
    /// Could not reach the backend
    Network(String),
    /// 5xx from the backend
    Server { status: u16, body: String },
    /// 429 from the backend
    RateLimited(String),
    /// 401 or 403: the key is wrong or lacks access
    Unauthorized { status: u16 },
    /// Any other 4xx
    Rejected { status: u16, body: String },
    /// The reply could not be read as a completion with JSON content
    MalformedResponse(String),
    /// The JSON did not satisfy the survey schema
    InvalidDocument(SchemaViolation),
    /// No API key configured
    NotConfigured,
}

impl GenerationFailure {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationFailure::Timeout(_)
                | GenerationFailure::Network(_)
                | GenerationFailure::Server { .. }
                | GenerationFailure::RateLimited(_)
                | GenerationFailure::MalformedResponse(_)
                | GenerationFailure::InvalidDocument(_)
        )
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => GenerationFailure::Unauthorized {
                status: status.as_u16(),
            },
            429 => GenerationFailure::RateLimited(body),
            code if status.is_server_error() => GenerationFailure::Server { status: code, body },
            code => GenerationFailure::Rejected { status: code, body },
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationFailure::Timeout(e.to_string())
        } else if e.is_decode() {
            GenerationFailure::MalformedResponse(e.to_string())
        } else {
            GenerationFailure::Network(e.to_string())
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationFailure::Timeout(msg) => write!(f, "request timed out: {}", msg),
            GenerationFailure::Network(msg) => write!(f, "network error: {}", msg),
            GenerationFailure::Server { status, body } => {
                write!(f, "server error {}: {}", status, truncate(body, 200))
            }
            GenerationFailure::RateLimited(body) => {
                write!(f, "rate limited: {}", truncate(body, 200))
            }
            GenerationFailure::Unauthorized { status } => {
                write!(f, "backend rejected credentials ({})", status)
            }
            GenerationFailure::Rejected { status, body } => {
                write!(f, "request rejected {}: {}", status, truncate(body, 200))
            }
            GenerationFailure::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            GenerationFailure::InvalidDocument(violation) => {
                write!(f, "invalid survey document: {}", violation)
            }
            GenerationFailure::NotConfigured => f.write_str("no API key configured"),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Survey generator backed by a chat-completions API
pub struct LlmSurveyGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl LlmSurveyGenerator {
    /// Build the HTTP client. Fails only if the TLS backend cannot be set up.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SurveyError::Config(format!("failed to build HTTP client: {}", e)))?;

        if config.api_key.is_empty() {
            warn!("No LLM API key configured, survey generation will fail");
        }
        info!("LLM survey generator using model {} at {}", config.model, config.api_url);

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn request_body<'a>(&'a self, description: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: description,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    async fn attempt(&self, description: &str) -> std::result::Result<SurveyDocument, GenerationFailure> {
        if self.config.api_key.is_empty() {
            return Err(GenerationFailure::NotConfigured);
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(description))
            .send()
            .await
            .map_err(GenerationFailure::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(GenerationFailure::from_reqwest)?;

        if !status.is_success() {
            return Err(GenerationFailure::from_status(status, body));
        }

        parse_completion(&body)
    }
}

/// Turn a chat-completions response body into a validated document
pub fn parse_completion(body: &str) -> std::result::Result<SurveyDocument, GenerationFailure> {
    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| GenerationFailure::MalformedResponse(format!("not a completion: {}", e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationFailure::MalformedResponse("no message content".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(strip_code_fence(&content))
        .map_err(|e| GenerationFailure::MalformedResponse(format!("content is not JSON: {}", e)))?;

    SurveyDocument::from_generated(value).map_err(GenerationFailure::InvalidDocument)
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl SurveyGenerator for LlmSurveyGenerator {
    async fn generate(&self, description: &str) -> Result<SurveyDocument> {
        debug!("Requesting survey from {}", self.config.model);

        let document = self
            .config
            .retry
            .run(
                "survey generation",
                || self.attempt(description),
                GenerationFailure::is_transient,
            )
            .await
            .map_err(|e| SurveyError::GenerationUnavailable(e.to_string()))?;

        info!(
            "Generated survey '{}' with {} questions",
            document.title,
            document.questions.len()
        );
        Ok(document)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
