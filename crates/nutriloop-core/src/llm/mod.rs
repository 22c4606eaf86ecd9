//! LLM provider abstraction.
//!
//! Agents talk to a [`LlmProvider`] trait object, so the network-backed
//! OpenAI provider and the deterministic scripted provider are
//! interchangeable. Provider selection happens once, at startup, via
//! [`build_provider`].

pub mod openai;
pub mod scripted;

pub use openai::OpenAiProvider;
pub use scripted::ScriptedProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// Parameters for one completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token usage reported for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response to a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    /// Model that actually served the request.
    pub model: String,
    pub usage: Usage,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("authentication failed, check the API key")]
    AuthenticationFailed,

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("no API key configured for provider {0}")]
    MissingApiKey(String),
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A chat completion backend.
///
/// Object safe: agents hold `Arc<dyn LlmProvider>` and never know which
/// backend answers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name, e.g. `"openai"` or `"scripted"`.
    fn name(&self) -> &str;

    /// Model used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn LlmProvider) {}
};

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Settings for [`build_provider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider name: `"openai"` or `"scripted"`.
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "scripted".to_string(),
            api_key: None,
            base_url: OpenAiProvider::DEFAULT_BASE_URL.to_string(),
            model: OpenAiProvider::DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Construct the provider named by `config`.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    match config.provider.as_str() {
        "scripted" => Ok(Arc::new(ScriptedProvider::new())),
        "openai" => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ProviderError::MissingApiKey("openai".to_string()))?;
            let provider = OpenAiProvider::new(
                api_key,
                &config.base_url,
                &config.model,
                config.timeout_secs,
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("a").role, Role::System);
        assert_eq!(ChatMessage::user("b").role, Role::User);
        assert_eq!(ChatMessage::assistant("c").role, Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).expect("should serialize message");
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn request_builder_overrides_model() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_model("gpt-4o")
            .with_temperature(0.2);
        assert_eq!(req.model.as_deref(), Some("gpt-4o"));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, None);
    }

    #[test]
    fn build_provider_defaults_to_scripted() {
        let provider =
            build_provider(&ProviderConfig::default()).expect("should build scripted provider");
        assert_eq!(provider.name(), "scripted");
    }

    #[test]
    fn build_provider_rejects_unknown_name() {
        let config = ProviderConfig {
            provider: "mystery".to_string(),
            ..ProviderConfig::default()
        };
        let err = build_provider(&config).err().expect("unknown provider should fail");
        assert!(matches!(err, ProviderError::UnknownProvider(name) if name == "mystery"));
    }

    #[test]
    fn build_provider_requires_openai_key() {
        let config = ProviderConfig {
            provider: "openai".to_string(),
            ..ProviderConfig::default()
        };
        let err = build_provider(&config).err().expect("missing key should fail");
        assert!(matches!(err, ProviderError::MissingApiKey(_)));
    }
}
