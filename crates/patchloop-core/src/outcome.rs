use patchloop_audit::AuditRole;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{LoopError, RunLog};

/// Exit code for a failed run, shared with hard errors in the binary
pub const FAILURE_EXIT_CODE: i32 = 2;

/// Why a run ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The scanner or patcher service call failed
    ExternalService { role: AuditRole },
    /// The first patch produced nothing usable
    MalformedPatchOutput,
}

impl FailureKind {
    /// The side of the loop that failed
    pub fn role(&self) -> AuditRole {
        match self {
            FailureKind::ExternalService { role } => *role,
            FailureKind::MalformedPatchOutput => AuditRole::Patcher,
        }
    }
}

/// How a run terminated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The scanner reported no issues
    Clean,
    /// Patch rounds ran out while the scanner still reported issues
    Exhausted { residual_findings: String },
    /// Stopped through the interrupt handle
    Interrupted,
    /// A hard failure ended the run
    Failed { kind: FailureKind, error: String },
}

/// The final result of a refinement run
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Last committed artifact. On failure, the artifact as it was before the
    /// failing call.
    pub final_artifact: String,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Patch rounds started
    pub iterations: usize,
    pub scanner_calls: usize,
    pub patcher_calls: usize,
    pub log: RunLog,
    pub total_duration_secs: f64,
    /// The error behind a `Failed` status
    #[serde(skip)]
    pub error: Option<LoopError>,
}

pub(crate) struct RunCounters {
    pub iterations: usize,
    pub scanner_calls: usize,
    pub patcher_calls: usize,
}

impl RunResult {
    pub(crate) fn new(
        final_artifact: String,
        status: RunStatus,
        counters: RunCounters,
        log: RunLog,
        duration: Duration,
        error: Option<LoopError>,
    ) -> Self {
        Self {
            final_artifact,
            status,
            iterations: counters.iterations,
            scanner_calls: counters.scanner_calls,
            patcher_calls: counters.patcher_calls,
            log,
            total_duration_secs: duration.as_secs_f64(),
            error,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self.status, RunStatus::Clean)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.status, RunStatus::Exhausted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    pub fn residual_findings(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Exhausted { residual_findings } => Some(residual_findings),
            _ => None,
        }
    }

    /// Short status label, as written to session transcripts
    pub fn status_label(&self) -> &'static str {
        match self.status {
            RunStatus::Clean => "clean",
            RunStatus::Exhausted { .. } => "exhausted",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed { .. } => "failed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Clean => 0,
            RunStatus::Exhausted { .. } => 1,
            RunStatus::Interrupted => 130,
            RunStatus::Failed { .. } => FAILURE_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(status: RunStatus) -> RunResult {
        RunResult::new(
            "code".into(),
            status,
            RunCounters {
                iterations: 1,
                scanner_calls: 2,
                patcher_calls: 1,
            },
            RunLog::new(),
            Duration::from_secs(3),
            None,
        )
    }

    #[test]
    fn test_exit_codes_keep_outcomes_distinct() {
        assert_eq!(result_with(RunStatus::Clean).exit_code(), 0);
        assert_eq!(
            result_with(RunStatus::Exhausted {
                residual_findings: "XSS".into()
            })
            .exit_code(),
            1
        );
        assert_eq!(result_with(RunStatus::Interrupted).exit_code(), 130);
        assert_eq!(
            result_with(RunStatus::Failed {
                kind: FailureKind::MalformedPatchOutput,
                error: "empty".into()
            })
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_serializes_status_inline() {
        let result = result_with(RunStatus::Exhausted {
            residual_findings: "path traversal".into(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "exhausted");
        assert_eq!(json["residual_findings"], "path traversal");
        assert_eq!(json["final_artifact"], "code");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_value(FailureKind::ExternalService {
            role: AuditRole::Patcher,
        })
        .unwrap();
        assert_eq!(json["external_service"]["role"], "patcher");
    }
}
