use async_trait::async_trait;
use patchloop_agent::{Agent, AgentConfig};
use tracing::{debug, info};

use crate::{AuditError, AuditPrompts, AuditRole, ScanResult};

/// Analyses an artifact and reports exploitable issues.
///
/// Implementations are expected to be stateless between calls.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, artifact: &str) -> Result<ScanResult, AuditError>;

    /// Model or backend name shown in logs
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Scanner backed by a hosted model
pub struct LlmScanner<'a> {
    agent: &'a dyn Agent,
    config: AgentConfig,
}

impl<'a> LlmScanner<'a> {
    pub fn new(agent: &'a dyn Agent, config: AgentConfig) -> Self {
        Self { agent, config }
    }
}

#[async_trait]
impl Scanner for LlmScanner<'_> {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn scan(&self, artifact: &str) -> Result<ScanResult, AuditError> {
        let prompt = AuditPrompts::scan_prompt(artifact);

        debug!(
            agent = self.agent.name(),
            prompt_len = prompt.len(),
            "Running scanner"
        );

        let output = self.agent.complete(&prompt, &self.config).await?;

        info!(
            duration_secs = output.duration.as_secs_f64(),
            output_tokens = output.usage.output_tokens,
            "Scanner completed"
        );

        ScanResult::from_response(&output.text).ok_or(AuditError::EmptyResponse {
            role: AuditRole::Scanner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchloop_agent::{AgentError, AgentOutput, AgentType, TokenUsage};
    use std::sync::Mutex;
    use std::time::Duration;

    struct CannedAgent {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for CannedAgent {
        fn name(&self) -> &str {
            "canned"
        }

        fn agent_type(&self) -> AgentType {
            AgentType::OpenAiCompat
        }

        async fn complete(
            &self,
            prompt: &str,
            config: &AgentConfig,
        ) -> Result<AgentOutput, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(AgentOutput::new(
                    text.clone(),
                    config.model.clone(),
                    TokenUsage::default(),
                    Duration::from_millis(5),
                )),
                Err(message) => Err(AgentError::InvalidResponse(message.clone())),
            }
        }
    }

    fn canned(reply: Result<&str, &str>) -> CannedAgent {
        CannedAgent {
            reply: reply.map(String::from).map_err(String::from),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_pass_reply_is_clean() {
        let agent = canned(Ok("PASS\n"));
        let scanner = LlmScanner::new(&agent, AgentConfig::default());
        assert_eq!(scanner.scan("print(1)").await.unwrap(), ScanResult::NoIssues);
        assert!(agent.prompts.lock().unwrap()[0].contains("print(1)"));
    }

    #[tokio::test]
    async fn test_findings_reply_is_issues() {
        let agent = canned(Ok("1. SQL injection in login()"));
        let scanner = LlmScanner::new(&agent, AgentConfig::default());
        let result = scanner.scan("code").await.unwrap();
        assert_eq!(result.issues(), Some("1. SQL injection in login()"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let agent = canned(Ok(""));
        let scanner = LlmScanner::new(&agent, AgentConfig::default());
        let err = scanner.scan("code").await.unwrap_err();
        assert!(matches!(
            err,
            AuditError::EmptyResponse {
                role: AuditRole::Scanner
            }
        ));
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let agent = canned(Err("boom"));
        let scanner = LlmScanner::new(&agent, AgentConfig::default());
        let err = scanner.scan("code").await.unwrap_err();
        assert!(matches!(err, AuditError::Agent(_)));
    }
}
