use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use patchloop_audit::{normalize_patch_output, preview, AuditRole, Patcher, ScanResult, Scanner};
use patchloop_logging::{LogEvent, Logger, SessionWriter};

use crate::context::{transition, LoopSettings, Phase, RunState, Transition};
use crate::error::LoopError;
use crate::outcome::{FailureKind, RunResult, RunStatus};

const LOG_PREVIEW_CHARS: usize = 120;

/// Drives the scan/patch loop over one artifact
pub struct RefinementLoop<'a> {
    scanner: &'a dyn Scanner,
    patcher: &'a dyn Patcher,
    logger: Arc<Logger>,
    session: Option<Arc<SessionWriter>>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(scanner: &'a dyn Scanner, patcher: &'a dyn Patcher, logger: Arc<Logger>) -> Self {
        Self {
            scanner,
            patcher,
            logger,
            session: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record every scan, patch and the final status to a session transcript
    pub fn with_session(mut self, session: Arc<SessionWriter>) -> Self {
        self.session = Some(session);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Scan and patch until the scanner reports no issues or the patch
    /// rounds run out.
    ///
    /// Only invalid settings or input produce `Err`, and always before the
    /// first call. Service failures come back as a `Failed` result holding
    /// the artifact as it was before the failing call.
    pub async fn run(
        &self,
        initial_artifact: String,
        settings: &LoopSettings,
    ) -> Result<RunResult, LoopError> {
        settings.validate(&initial_artifact)?;

        self.logger.log(&LogEvent::RunStarted {
            artifact_lines: initial_artifact.lines().count(),
            artifact_bytes: initial_artifact.len(),
            max_iterations: settings.max_iterations,
            scanner_model: self.scanner.model().to_string(),
            patcher_model: self.patcher.model().to_string(),
        });

        let mut state = RunState::new(initial_artifact, settings.max_iterations);
        let mut phase = Phase::Scanning;

        loop {
            if !settings.call_delay.is_zero() {
                tokio::time::sleep(settings.call_delay).await;
            }

            if self.interrupted.load(Ordering::SeqCst) {
                info!("Run interrupted by user");
                return Ok(self.finish_interrupted(state));
            }

            phase = match phase {
                Phase::Scanning => match self.scan(&mut state).await {
                    Ok(Transition::Clean) => return Ok(self.finish_clean(state)),
                    Ok(Transition::Patch { findings }) => {
                        state.iteration += 1;
                        Phase::Patching { findings }
                    }
                    Ok(Transition::Exhausted { residual_findings }) => {
                        self.logger.log(&LogEvent::MaxIterationsReached {
                            iterations: state.iteration,
                            residual_preview: preview(&residual_findings, LOG_PREVIEW_CHARS),
                        });
                        return Ok(self.finish_exhausted(state, residual_findings));
                    }
                    Err(error) => return Ok(self.finish_failed(state, error)),
                },
                Phase::Patching { findings } => match self.patch(&mut state, &findings).await {
                    Ok(()) => Phase::Scanning,
                    // A later round keeps the artifact from the round before
                    Err(LoopError::MalformedPatchOutput { iteration }) if iteration > 1 => {
                        warn!(iteration, "Keeping previous artifact");
                        return Ok(self.finish_exhausted(state, findings));
                    }
                    Err(error) => return Ok(self.finish_failed(state, error)),
                },
            };
        }
    }

    /// Run one scanner call and decide what comes next
    async fn scan(&self, state: &mut RunState) -> Result<Transition, LoopError> {
        state.scanner_calls += 1;
        let scan = state.scanner_calls;
        let iteration = state.iteration;

        self.logger.log(&LogEvent::ScanStarted { scan, iteration });
        debug!(scan, iteration, "Running scanner");

        let started = Instant::now();
        let result = match self.scanner.scan(&state.artifact).await {
            Ok(result) => result,
            Err(source) => {
                state.record(AuditRole::Scanner, format!("call failed: {}", source));
                return Err(LoopError::ExternalService {
                    role: AuditRole::Scanner,
                    source,
                });
            }
        };
        let duration_secs = started.elapsed().as_secs_f64();

        let message = match &result {
            ScanResult::NoIssues => "no exploitable issues".to_string(),
            ScanResult::Issues(findings) => {
                format!("issues found: {}", preview(findings, LOG_PREVIEW_CHARS))
            }
        };
        state.record(AuditRole::Scanner, message);

        self.logger.log(&LogEvent::ScanCompleted {
            scan,
            iteration,
            verdict: result.short_description(),
            duration_secs,
        });
        if let Some(session) = &self.session {
            session.write_scan(scan, iteration, result.issues(), duration_secs);
        }

        Ok(transition(state.iteration, state.max_iterations, result))
    }

    /// Run one patcher call and commit its normalized output
    async fn patch(&self, state: &mut RunState, findings: &str) -> Result<(), LoopError> {
        state.patcher_calls += 1;
        let iteration = state.iteration;

        self.logger.log(&LogEvent::PatchStarted {
            iteration,
            findings_preview: preview(findings, LOG_PREVIEW_CHARS),
        });
        debug!(iteration, "Running patcher");

        let started = Instant::now();
        let raw = match self.patcher.patch(&state.artifact, findings).await {
            Ok(raw) => raw,
            Err(source) => {
                state.record(AuditRole::Patcher, format!("call failed: {}", source));
                return Err(LoopError::ExternalService {
                    role: AuditRole::Patcher,
                    source,
                });
            }
        };
        let duration_secs = started.elapsed().as_secs_f64();

        let patched = normalize_patch_output(&raw);
        if patched.is_empty() {
            state.record(
                AuditRole::Patcher,
                "output was empty after removing fences and preamble",
            );
            self.logger.log(&LogEvent::PatchOutputMalformed { iteration });
            return Err(LoopError::MalformedPatchOutput { iteration });
        }

        let artifact_lines = patched.lines().count();
        state.record(
            AuditRole::Patcher,
            format!("rewrote artifact ({} lines)", artifact_lines),
        );
        self.logger.log(&LogEvent::PatchCompleted {
            iteration,
            artifact_lines,
            duration_secs,
        });
        if let Some(session) = &self.session {
            session.write_patch(iteration, &patched, duration_secs);
        }

        state.commit_patch(patched);
        Ok(())
    }

    fn finish_clean(&self, state: RunState) -> RunResult {
        self.logger.log(&LogEvent::RunCompleted {
            iterations: state.iteration,
            scanner_calls: state.scanner_calls,
            patcher_calls: state.patcher_calls,
            duration_secs: state.total_duration().as_secs_f64(),
        });
        self.finish(state, RunStatus::Clean, None)
    }

    fn finish_exhausted(&self, state: RunState, residual_findings: String) -> RunResult {
        self.finish(state, RunStatus::Exhausted { residual_findings }, None)
    }

    fn finish_interrupted(&self, state: RunState) -> RunResult {
        self.logger.log(&LogEvent::RunInterrupted {
            iterations: state.iteration,
        });
        self.finish(state, RunStatus::Interrupted, Some(LoopError::Interrupted))
    }

    fn finish_failed(&self, state: RunState, error: LoopError) -> RunResult {
        let kind = match error.failure_kind() {
            Some(kind) => kind,
            None => FailureKind::ExternalService {
                role: AuditRole::Scanner,
            },
        };
        warn!(error = %error, "Run failed");
        self.logger.log(&LogEvent::ErrorEncountered {
            iteration: state.iteration,
            role: kind.role().to_string(),
            error: error.to_string(),
        });

        let status = RunStatus::Failed {
            kind,
            error: error.to_string(),
        };
        self.finish(state, status, Some(error))
    }

    fn finish(&self, state: RunState, status: RunStatus, error: Option<LoopError>) -> RunResult {
        let duration = state.total_duration();
        let counters = state.counters();
        let result = RunResult::new(state.artifact, status, counters, state.log, duration, error);

        if let Some(session) = &self.session {
            let error = result.error.as_ref().map(|e| e.to_string());
            session.write_end(
                result.status_label(),
                result.iterations,
                result.scanner_calls,
                result.patcher_calls,
                error.as_deref(),
                result.total_duration_secs,
            );
        }

        result
    }
}
