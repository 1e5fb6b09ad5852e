use patchloop_audit::{AuditRole, ScanResult};
use std::time::{Duration, Instant};

use crate::outcome::RunCounters;
use crate::{LoopError, RunLog};

/// Default bound on patch rounds
pub const DEFAULT_MAX_ITERATIONS: usize = 4;

/// Per-run settings for the refinement loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Maximum number of patch rounds. A run makes at most this many patcher
    /// calls and one more scanner call.
    pub max_iterations: usize,
    /// Pause before every scanner or patcher call
    pub call_delay: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_delay: Duration::ZERO,
        }
    }
}

impl LoopSettings {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Reject settings or input that cannot start a run
    pub fn validate(&self, artifact: &str) -> Result<(), LoopError> {
        if self.max_iterations == 0 {
            return Err(LoopError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if artifact.trim().is_empty() {
            return Err(LoopError::InvalidConfiguration(
                "input artifact is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the loop does after a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing left to fix
    Clean,
    /// Start the next patch round with these findings
    Patch { findings: String },
    /// Issues remain but no patch rounds are left
    Exhausted { residual_findings: String },
}

/// Decide the next step from a scan result.
///
/// `iteration` is the number of patch rounds already started.
pub fn transition(iteration: usize, max_iterations: usize, scan: ScanResult) -> Transition {
    match scan {
        ScanResult::NoIssues => Transition::Clean,
        ScanResult::Issues(findings) if iteration < max_iterations => {
            Transition::Patch { findings }
        }
        ScanResult::Issues(residual_findings) => Transition::Exhausted { residual_findings },
    }
}

/// Where the loop is between calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Scanning,
    Patching { findings: String },
}

/// Mutable state owned by a single run
#[derive(Debug)]
pub(crate) struct RunState {
    /// Last committed artifact
    pub artifact: String,
    /// Patch rounds started
    pub iteration: usize,
    pub max_iterations: usize,
    pub scanner_calls: usize,
    pub patcher_calls: usize,
    pub log: RunLog,
    started_at: Instant,
}

impl RunState {
    pub fn new(artifact: String, max_iterations: usize) -> Self {
        Self {
            artifact,
            iteration: 0,
            max_iterations,
            scanner_calls: 0,
            patcher_calls: 0,
            log: RunLog::new(),
            started_at: Instant::now(),
        }
    }

    pub fn record(&mut self, role: AuditRole, message: impl Into<String>) {
        let iteration = self.iteration;
        self.log.push(role, iteration, message);
    }

    /// Replace the artifact with a normalized patch result
    pub fn commit_patch(&mut self, artifact: String) {
        self.artifact = artifact;
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            iterations: self.iteration,
            scanner_calls: self.scanner_calls,
            patcher_calls: self.patcher_calls,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
