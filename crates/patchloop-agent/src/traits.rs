use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::AgentOutput;

/// Errors that can occur while calling a hosted model
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingCredentials { env_var: String },
}

/// Configuration for a single completion call
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Provider base URL (without the endpoint path)
    pub base_url: String,
    /// Resolved API key
    pub api_key: Option<String>,
    /// Name of the environment variable the key was read from, for error messages
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout (None = client default)
    pub timeout: Option<Duration>,
}

pub const DEFAULT_OPENAI_COMPAT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_OPENAI_COMPAT_MODEL: &str = "glm-4.5-air";
pub const DEFAULT_OPENAI_COMPAT_KEY_ENV: &str = "CHAT_API_KEY";

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

impl Default for AgentConfig {
    fn default() -> Self {
        Self::for_type(AgentType::OpenAiCompat)
    }
}

impl AgentConfig {
    /// Provider defaults for the given backend, with no key resolved yet
    pub fn for_type(agent_type: AgentType) -> Self {
        let (model, base_url, api_key_env) = match agent_type {
            AgentType::OpenAiCompat => (
                DEFAULT_OPENAI_COMPAT_MODEL,
                DEFAULT_OPENAI_COMPAT_BASE_URL,
                DEFAULT_OPENAI_COMPAT_KEY_ENV,
            ),
            AgentType::Anthropic => (
                DEFAULT_ANTHROPIC_MODEL,
                DEFAULT_ANTHROPIC_BASE_URL,
                DEFAULT_ANTHROPIC_KEY_ENV,
            ),
        };

        Self {
            model: model.to_string(),
            base_url: base_url.to_string(),
            api_key: None,
            api_key_env: api_key_env.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read the API key from the configured environment variable.
    /// Leaves the key unset if the variable is missing or empty.
    pub fn resolve_api_key_from_env(mut self) -> Self {
        self.api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        self
    }

    /// The resolved key, or a `MissingCredentials` error naming the variable
    pub fn require_api_key(&self) -> Result<&str, AgentError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AgentError::MissingCredentials {
                env_var: self.api_key_env.clone(),
            })
    }

    /// Join the base URL and an endpoint path without doubling slashes
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Supported hosted model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    /// Any provider exposing an OpenAI-style `chat/completions` endpoint
    OpenAiCompat,
    Anthropic,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::OpenAiCompat => write!(f, "openai"),
            AgentType::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compat" | "chat-completions" | "zhipu" | "glm" => {
                Ok(AgentType::OpenAiCompat)
            }
            "anthropic" | "claude" => Ok(AgentType::Anthropic),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// A stateless completion call against a hosted model.
///
/// Every call is independent: no conversation state is kept between calls,
/// and failures are returned as-is without retrying.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    fn agent_type(&self) -> AgentType;

    /// Send a single user prompt and return the model's text reply
    async fn complete(&self, prompt: &str, config: &AgentConfig)
        -> Result<AgentOutput, AgentError>;

    /// Whether the backend has what it needs to make a call
    fn is_available(&self, config: &AgentConfig) -> bool {
        config.api_key.is_some()
    }
}
