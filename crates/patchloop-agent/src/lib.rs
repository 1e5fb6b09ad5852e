mod anthropic;
mod openai;
mod output;
mod traits;
mod transport;

pub use anthropic::AnthropicAgent;
pub use openai::OpenAiCompatAgent;
pub use output::{AgentOutput, TokenUsage};
pub use traits::{
    Agent, AgentConfig, AgentError, AgentType, DEFAULT_ANTHROPIC_BASE_URL,
    DEFAULT_ANTHROPIC_KEY_ENV, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_OPENAI_COMPAT_BASE_URL, DEFAULT_OPENAI_COMPAT_KEY_ENV, DEFAULT_OPENAI_COMPAT_MODEL,
    DEFAULT_TEMPERATURE,
};
pub use transport::HttpTransport;

/// Create an agent by type
pub fn create_agent(agent_type: AgentType) -> Box<dyn Agent> {
    match agent_type {
        AgentType::OpenAiCompat => Box::new(OpenAiCompatAgent::new()),
        AgentType::Anthropic => Box::new(AnthropicAgent::new()),
    }
}
