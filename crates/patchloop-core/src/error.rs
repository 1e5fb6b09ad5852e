use patchloop_audit::{AuditError, AuditRole};
use thiserror::Error;

use crate::FailureKind;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("The {role} call failed: {source}")]
    ExternalService {
        role: AuditRole,
        #[source]
        source: AuditError,
    },

    #[error("Patcher output was empty after cleanup in round {iteration}")]
    MalformedPatchOutput { iteration: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Run was interrupted")]
    Interrupted,
}

impl LoopError {
    /// How this error is reported in a failed run, if it ends one
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            LoopError::ExternalService { role, .. } => {
                Some(FailureKind::ExternalService { role: *role })
            }
            LoopError::MalformedPatchOutput { .. } => Some(FailureKind::MalformedPatchOutput),
            LoopError::InvalidConfiguration(_) | LoopError::Interrupted => None,
        }
    }
}
