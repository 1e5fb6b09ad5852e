use async_trait::async_trait;
use patchloop_agent::{Agent, AgentConfig};
use tracing::{debug, info};

use crate::{AuditError, AuditPrompts};

/// Produces a revised artifact that addresses the given issues.
///
/// The returned text is the raw reply, possibly blank; callers normalize it
/// with [`crate::normalize_patch_output`] and decide what an empty result
/// means.
#[async_trait]
pub trait Patcher: Send + Sync {
    async fn patch(&self, artifact: &str, issues: &str) -> Result<String, AuditError>;

    /// Model or backend name shown in logs
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Patcher backed by a hosted model
pub struct LlmPatcher<'a> {
    agent: &'a dyn Agent,
    config: AgentConfig,
}

impl<'a> LlmPatcher<'a> {
    pub fn new(agent: &'a dyn Agent, config: AgentConfig) -> Self {
        Self { agent, config }
    }
}

#[async_trait]
impl Patcher for LlmPatcher<'_> {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn patch(&self, artifact: &str, issues: &str) -> Result<String, AuditError> {
        let prompt = AuditPrompts::patch_prompt(artifact, issues);

        debug!(
            agent = self.agent.name(),
            prompt_len = prompt.len(),
            issues_len = issues.len(),
            "Running patcher"
        );

        let output = self.agent.complete(&prompt, &self.config).await?;

        info!(
            duration_secs = output.duration.as_secs_f64(),
            lines = output.line_count(),
            "Patcher completed"
        );

        Ok(output.text)
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
                Err(message) => Err(AgentError::Api {
                    status: 500,
                    message: message.clone(),
                }),
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
    async fn test_prompt_carries_artifact_and_issues() {
        let agent = canned(Ok("fixed"));
        let patcher = LlmPatcher::new(&agent, AgentConfig::default());
        patcher
            .patch("os.system(cmd)", "1. command injection via cmd")
            .await
            .unwrap();

        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("os.system(cmd)"));
        assert!(prompts[0].contains("1. command injection via cmd"));
    }

    #[tokio::test]
    async fn test_reply_is_returned_raw() {
        let raw = "Here is the fix:\n```python\nsubprocess.run([\"ls\"])\n```";
        let agent = canned(Ok(raw));
        let patcher = LlmPatcher::new(&agent, AgentConfig::default());
        assert_eq!(patcher.patch("code", "RCE").await.unwrap(), raw);
    }

    #[tokio::test]
    async fn test_blank_reply_is_not_an_error() {
        let agent = canned(Ok("   \n"));
        let patcher = LlmPatcher::new(&agent, AgentConfig::default());
        assert_eq!(patcher.patch("code", "XSS").await.unwrap(), "   \n");
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let agent = canned(Err("upstream down"));
        let patcher = LlmPatcher::new(&agent, AgentConfig::default());
        let err = patcher.patch("code", "XSS").await.unwrap_err();
        assert!(matches!(
            err,
            AuditError::Agent(AgentError::Api { status: 500, .. })
        ));
    }

    #[test]
    fn test_model_comes_from_config() {
        let agent = canned(Ok("x"));
        let config = AgentConfig::default().with_model("glm-4.6".into());
        let patcher = LlmPatcher::new(&agent, config);
        assert_eq!(patcher.model(), "glm-4.6");
    }
}
