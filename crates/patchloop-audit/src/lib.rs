mod error;
mod findings;
mod normalize;
mod patcher;
mod prompts;
mod scanner;

pub use error::{AuditError, AuditRole};
pub use findings::{preview, ScanResult, NO_ISSUES_SENTINEL};
pub use normalize::normalize_patch_output;
pub use patcher::{LlmPatcher, Patcher};
pub use prompts::AuditPrompts;
pub use scanner::{LlmScanner, Scanner};
