mod context;
mod error;
mod loop_runner;
mod outcome;
mod run_log;

pub use context::{transition, LoopSettings, Transition, DEFAULT_MAX_ITERATIONS};
pub use error::LoopError;
pub use loop_runner::RefinementLoop;
pub use outcome::{FailureKind, RunResult, RunStatus, FAILURE_EXIT_CODE};
pub use run_log::{RunLog, RunLogEntry};
