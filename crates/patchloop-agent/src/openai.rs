use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, HttpTransport, TokenUsage};

/// Agent for providers that speak the OpenAI `chat/completions` protocol
/// (Zhipu GLM, OpenAI, most self-hosted gateways)
pub struct OpenAiCompatAgent {
    http: Client,
}

impl OpenAiCompatAgent {
    pub fn new() -> Self {
        Self {
            http: HttpTransport::client(),
        }
    }

    fn build_request_body(prompt: &str, config: &AgentConfig) -> Value {
        json!({
            "model": config.model,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }

    fn parse_response(
        value: &Value,
        config: &AgentConfig,
    ) -> Result<(String, String, TokenUsage), AgentError> {
        let text = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::InvalidResponse("missing choices[0].message.content".to_string())
            })?
            .to_string();

        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&config.model)
            .to_string();

        let usage = value
            .get("usage")
            .map(|usage| TokenUsage {
                input_tokens: usage
                    .get("prompt_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                output_tokens: usage
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            })
            .unwrap_or_default();

        Ok((text, model, usage))
    }
}

impl Default for OpenAiCompatAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for OpenAiCompatAgent {
    fn name(&self) -> &str {
        "OpenAI-compatible"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::OpenAiCompat
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        let api_key = config.require_api_key()?;
        let url = config.endpoint("chat/completions");

        debug!(
            agent = self.name(),
            model = %config.model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let request = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&Self::build_request_body(prompt, config));

        let (value, duration) = HttpTransport::send_json(request, config).await?;
        let (text, model, usage) = Self::parse_response(&value, config)?;

        debug!(
            model = %model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            duration_ms = duration.as_millis(),
            "Completion received"
        );

        Ok(AgentOutput::new(text, model, usage, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::ServerGuard) -> AgentConfig {
        AgentConfig::default()
            .with_base_url(server.url())
            .with_api_key("test-key".into())
    }

    #[test]
    fn test_request_body_shape() {
        let config = AgentConfig::default();
        let body = OpenAiCompatAgent::build_request_body("scan this", &config);
        assert_eq!(body["model"], "glm-4.5-air");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "scan this");
    }

    #[tokio::test]
    async fn test_complete_parses_content_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model":"glm-4.5-air","choices":[{"message":{"role":"assistant","content":"PASS"}}],"usage":{"prompt_tokens":12,"completion_tokens":1}}"#,
            )
            .create_async()
            .await;

        let agent = OpenAiCompatAgent::new();
        let output = agent.complete("code", &config_for(&server)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(output.text, "PASS");
        assert_eq!(output.usage.input_tokens, 12);
        assert_eq!(output.usage.output_tokens, 1);
    }

    #[tokio::test]
    async fn test_complete_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let agent = OpenAiCompatAgent::new();
        let err = agent
            .complete("code", &config_for(&server))
            .await
            .unwrap_err();

        match err {
            AgentError::RateLimited { retry_after } => assert_eq!(retry_after.as_secs(), 7),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_does_not_retry_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("upstream unavailable")
            .expect(1)
            .create_async()
            .await;

        let agent = OpenAiCompatAgent::new();
        let err = agent
            .complete("code", &config_for(&server))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AgentError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_before_request() {
        let agent = OpenAiCompatAgent::new();
        let err = agent
            .complete("code", &AgentConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_complete_rejects_missing_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let agent = OpenAiCompatAgent::new();
        let err = agent
            .complete("code", &config_for(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }
}
