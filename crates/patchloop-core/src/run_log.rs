use chrono::{DateTime, Utc};
use patchloop_audit::AuditRole;
use serde::{Deserialize, Serialize};

/// One human-readable record of a scanner or patcher call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// Position in the log, starting at 0
    pub sequence: usize,
    pub timestamp: DateTime<Utc>,
    pub role: AuditRole,
    /// Patch rounds started when the call was made
    pub iteration: usize,
    pub message: String,
}

impl std::fmt::Display for RunLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.role {
            AuditRole::Scanner => "Scanner",
            AuditRole::Patcher => "Patcher",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

/// Append-only event log of a run. Has no effect on control flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunLog {
    entries: Vec<RunLogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        role: AuditRole,
        iteration: usize,
        message: impl Into<String>,
    ) {
        let entry = RunLogEntry {
            sequence: self.entries.len(),
            timestamp: Utc::now(),
            role,
            iteration,
            message: message.into(),
        };
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunLogEntry> {
        self.entries.iter()
    }

    /// Number of entries written by the given role
    pub fn count(&self, role: AuditRole) -> usize {
        self.entries.iter().filter(|e| e.role == role).count()
    }
}
