//! OpenAI-compatible LLM client.
//!
//! Talks to any endpoint implementing the **OpenAI Chat Completions API**
//! (Groq by default, also OpenAI, Together, vLLM, Ollama) in non-streaming
//! mode.  Every prompt the assistant sends is a single request/response
//! round trip.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::types::{ChatRequest, ChatResponse, Message, Role, Usage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default API base URL (Groq's OpenAI-compatible endpoint).
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// API key for bearer authentication.
    pub api_key: String,
    /// Base URL for the API, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Default model identifier.
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl LlmClientConfig {
    /// Create a configuration for Groq with the default model.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::openai_compatible(api_key, DEFAULT_MODEL, GROQ_BASE_URL)
    }

    /// Create a configuration for any OpenAI-compatible API.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: model.into(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatModel
// ---------------------------------------------------------------------------

/// Anything that can turn a conversation into one text reply.
///
/// [`LlmClient`] is the production implementation; the assistant depends
/// only on this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: Vec<Message>) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client for the OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: provider_name(&config.base_url),
            });
        }
        if config.base_url.trim().is_empty() {
            return Err(AgentError::ConfigError {
                reason: "llm base_url is empty".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// The model used when a request does not name one.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request_body(request);
        let resp = self.send_request(&body).await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        let response = parse_openai_response(&v)?;
        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LLM response received"
        );
        Ok(response)
    }

    // -- Request building ----------------------------------------------------

    /// Build the JSON body for the Chat Completions API.
    fn build_request_body(&self, request: &ChatRequest) -> Value {
        json!({
            "model": if request.model.is_empty() {
                &self.config.default_model
            } else {
                &request.model
            },
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "messages": messages_to_openai(&request.messages),
        })
    }

    /// Send the HTTP request to the `/chat/completions` endpoint.
    async fn send_request(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], "sending LLM request");

        self.http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let response = self.chat(&ChatRequest::new(messages)).await?;
        Ok(response.content.trim().to_owned())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Convert messages into the Chat Completions wire format.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": msg.content })
        })
        .collect()
}

/// Parse a non-streaming Chat Completions response.
pub fn parse_openai_response(v: &Value) -> Result<ChatResponse> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    let content = message["content"]
        .as_str()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing text content in `choices[0].message`".into(),
        })?
        .to_owned();

    let usage = Usage {
        input_tokens: token_count(&v["usage"]["prompt_tokens"]),
        output_tokens: token_count(&v["usage"]["completion_tokens"]),
    };

    Ok(ChatResponse {
        content,
        model: v["model"].as_str().map(str::to_owned),
        usage,
    })
}

fn token_count(v: &Value) -> u32 {
    v.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}

/// A short provider label for error messages, derived from the base URL.
fn provider_name(base_url: &str) -> String {
    base_url
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .filter(|host| !host.is_empty())
        .unwrap_or("openai-compatible")
        .to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_config_defaults() {
        let config = LlmClientConfig::groq("gsk-test");
        assert_eq!(config.base_url, GROQ_BASE_URL);
        assert_eq!(config.default_model, "llama3-70b-8192");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn empty_api_key_returns_error() {
        let err = LlmClient::new(LlmClientConfig::groq("")).unwrap_err();
        assert!(matches!(
            err,
            AgentError::MissingApiKey { ref provider } if provider == "api.groq.com"
        ));
    }

    #[test]
    fn build_request_body_uses_defaults() {
        let client = LlmClient::new(LlmClientConfig::groq("gsk-test")).unwrap();
        let request = ChatRequest::new(vec![Message::system("be brief"), Message::user("hi")]);
        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn build_request_body_respects_overrides() {
        let client = LlmClient::new(LlmClientConfig::groq("gsk-test")).unwrap();
        let request = ChatRequest {
            model: "mixtral-8x7b-32768".into(),
            messages: vec![Message::user("hi")],
            temperature: Some(0.5),
            max_tokens: Some(64),
        };
        let body = client.build_request_body(&request);
        assert_eq!(body["model"], "mixtral-8x7b-32768");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn messages_to_openai_roles() {
        let wire = messages_to_openai(&[Message::assistant("ok")]);
        assert_eq!(wire[0], json!({"role": "assistant", "content": "ok"}));
    }

    #[test]
    fn parse_text_response() {
        let v = json!({
            "model": "llama3-70b-8192",
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response = parse_openai_response(&v).unwrap();
        assert_eq!(response.content, "SELECT 1");
        assert_eq!(response.model.as_deref(), Some("llama3-70b-8192"));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn parse_missing_choices_fails() {
        let err = parse_openai_response(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, AgentError::LlmParseFailed { .. }));

        let err =
            parse_openai_response(&json!({"choices": [{"message": {"content": null}}]})).unwrap_err();
        assert!(matches!(err, AgentError::LlmParseFailed { .. }));
    }
}
