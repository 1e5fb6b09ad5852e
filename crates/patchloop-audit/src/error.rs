use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external capability a call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRole {
    Scanner,
    Patcher,
}

impl std::fmt::Display for AuditRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditRole::Scanner => write!(f, "scanner"),
            AuditRole::Patcher => write!(f, "patcher"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Agent execution error: {0}")]
    Agent(#[from] patchloop_agent::AgentError),

    #[error("The {role} returned an empty reply")]
    EmptyResponse { role: AuditRole },
}
