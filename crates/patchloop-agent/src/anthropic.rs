use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, HttpTransport, TokenUsage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Agent for Anthropic's Messages API
pub struct AnthropicAgent {
    http: Client,
}

impl AnthropicAgent {
    pub fn new() -> Self {
        Self {
            http: HttpTransport::client(),
        }
    }

    fn build_request_body(prompt: &str, config: &AgentConfig) -> Value {
        json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }

    /// Concatenate the text blocks of a Messages API reply
    fn parse_response(
        value: &Value,
        config: &AgentConfig,
    ) -> Result<(String, String, TokenUsage), AgentError> {
        let blocks = value
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::InvalidResponse("missing content array".to_string()))?;

        let text: String = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");

        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&config.model)
            .to_string();

        let usage = TokenUsage {
            input_tokens: value
                .pointer("/usage/input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            output_tokens: value
                .pointer("/usage/output_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        };

        Ok((text, model, usage))
    }
}

impl Default for AnthropicAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for AnthropicAgent {
    fn name(&self) -> &str {
        "Anthropic"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Anthropic
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        let api_key = config.require_api_key()?;
        let url = config.endpoint("v1/messages");

        debug!(
            agent = self.name(),
            model = %config.model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let request = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::build_request_body(prompt, config));

        let (value, duration) = HttpTransport::send_json(request, config).await?;
        let (text, model, usage) = Self::parse_response(&value, config)?;

        Ok(AgentOutput::new(text, model, usage, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let value = json!({
            "model": "claude-sonnet-4-20250514",
            "content": [
                { "type": "text", "text": "first " },
                { "type": "tool_use", "id": "t1", "name": "x", "input": {} },
                { "type": "text", "text": "second" }
            ],
            "usage": { "input_tokens": 30, "output_tokens": 4 }
        });
        let config = AgentConfig::for_type(AgentType::Anthropic);
        let (text, model, usage) = AnthropicAgent::parse_response(&value, &config).unwrap();
        assert_eq!(text, "first second");
        assert_eq!(model, "claude-sonnet-4-20250514");
        assert_eq!(usage.input_tokens, 30);
    }

    #[tokio::test]
    async fn test_complete_sends_version_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"PASS"}]}"#)
            .create_async()
            .await;

        let config = AgentConfig::for_type(AgentType::Anthropic)
            .with_base_url(server.url())
            .with_api_key("sk-ant".into());
        let output = AnthropicAgent::new().complete("code", &config).await.unwrap();

        mock.assert_async().await;
        assert_eq!(output.text, "PASS");
        assert_eq!(output.model, config.model);
    }
}
