use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the scan/patch loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        artifact_lines: usize,
        artifact_bytes: usize,
        max_iterations: usize,
        scanner_model: String,
        patcher_model: String,
    },
    ScanStarted {
        /// 1-based count of scanner calls in this run
        scan: usize,
        /// Patch rounds completed before this scan
        iteration: usize,
    },
    ScanCompleted {
        scan: usize,
        iteration: usize,
        verdict: String,
        duration_secs: f64,
    },
    PatchStarted {
        /// 1-based patch round
        iteration: usize,
        findings_preview: String,
    },
    PatchCompleted {
        iteration: usize,
        artifact_lines: usize,
        duration_secs: f64,
    },
    PatchOutputMalformed {
        iteration: usize,
    },
    RunCompleted {
        iterations: usize,
        scanner_calls: usize,
        patcher_calls: usize,
        duration_secs: f64,
    },
    MaxIterationsReached {
        iterations: usize,
        residual_preview: String,
    },
    RunInterrupted {
        iterations: usize,
    },
    ErrorEncountered {
        iteration: usize,
        role: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
            quiet: false,
        }
    }

    /// A logger that writes nothing to the console
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            file_writer: None,
            quiet: true,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
            quiet: false,
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                artifact_lines,
                max_iterations,
                scanner_model,
                patcher_model,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "patchloop".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let summary = format!(
                    "{} lines, up to {} patch rounds",
                    artifact_lines, max_iterations
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Input:".dimmed(),
                    Self::truncate_with_padding(&summary, 58, 66).dimmed()
                );
                let models = format!("{} / {}", scanner_model, patcher_model);
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Models:".dimmed(),
                    Self::truncate_with_padding(&models, 57, 65).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::ScanStarted { scan, .. } => {
                let scan_text = format!("─ Scan {} ", scan);
                let padding = "─".repeat(67 - scan_text.chars().count());
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    scan_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "SCANNER".bright_cyan().bold()
                );
            }
            LogEvent::ScanCompleted {
                verdict,
                duration_secs,
                ..
            } => {
                let styled = if verdict == "PASS" {
                    format!("✓ Clean ({:.1}s)", duration_secs)
                        .bright_green()
                        .to_string()
                } else {
                    format!("✗ {} ({:.1}s)", verdict, duration_secs)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(stderr);
            }
            LogEvent::PatchStarted { iteration, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_magenta(),
                    "PATCHER".bright_magenta().bold(),
                    format!("(round {})", iteration).dimmed()
                );
            }
            LogEvent::PatchCompleted {
                artifact_lines,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Rewrote artifact: {} lines ({:.1}s)",
                    "✓".bright_green(),
                    artifact_lines,
                    duration_secs
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::PatchOutputMalformed { iteration } => {
                let _ = writeln!(
                    stderr,
                    "    {} Patch output in round {} was empty after cleanup",
                    "⚠".bright_yellow(),
                    iteration
                );
            }
            LogEvent::RunCompleted { .. } => {
                // Printed with the final outcome by the binary
            }
            LogEvent::MaxIterationsReached { iterations, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Maximum patch rounds reached ({})",
                    "⚠".bright_yellow(),
                    iterations
                );
            }
            LogEvent::RunInterrupted { iterations } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Interrupted after {} patch round(s)",
                    "⚠".bright_yellow(),
                    iterations
                );
            }
            LogEvent::ErrorEncountered {
                iteration,
                role,
                error,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} failed in round {}: {}",
                    "✗".bright_red(),
                    role,
                    iteration,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { max_iterations, .. } => {
                format!("[{}] run:start max={}", timestamp, max_iterations)
            }
            LogEvent::ScanStarted { scan, .. } => format!("[{}] scan:start:{}", timestamp, scan),
            LogEvent::ScanCompleted {
                scan,
                verdict,
                duration_secs,
                ..
            } => format!(
                "[{}] scan:done:{} {} {:.1}s",
                timestamp, scan, verdict, duration_secs
            ),
            LogEvent::PatchStarted { iteration, .. } => {
                format!("[{}] patch:start:{}", timestamp, iteration)
            }
            LogEvent::PatchCompleted {
                iteration,
                artifact_lines,
                duration_secs,
            } => format!(
                "[{}] patch:done:{} lines={} {:.1}s",
                timestamp, iteration, artifact_lines, duration_secs
            ),
            LogEvent::PatchOutputMalformed { iteration } => {
                format!("[{}] patch:malformed:{}", timestamp, iteration)
            }
            LogEvent::RunCompleted {
                iterations,
                duration_secs,
                ..
            } => format!(
                "[{}] run:clean:{} {:.1}s",
                timestamp, iterations, duration_secs
            ),
            LogEvent::MaxIterationsReached { iterations, .. } => {
                format!("[{}] run:limit:{}", timestamp, iterations)
            }
            LogEvent::RunInterrupted { iterations } => {
                format!("[{}] run:interrupted:{}", timestamp, iterations)
            }
            LogEvent::ErrorEncountered {
                iteration,
                role,
                error,
            } => format!("[{}] error:{}:{}:{}", timestamp, role, iteration, error),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LogEvent::ScanCompleted {
            scan: 2,
            iteration: 1,
            verdict: "PASS".into(),
            duration_secs: 0.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "scan_completed");
        assert_eq!(json["scan"], 2);
    }

    #[test]
    fn test_file_logger_appends_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let logger = Logger::with_file(LogFormat::Json, &path).unwrap();

        logger.log(&LogEvent::RunInterrupted { iterations: 1 });
        logger.log(&LogEvent::PatchOutputMalformed { iteration: 2 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_interrupted");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding_fixed_width() {
        let padded = Logger::truncate_with_padding("abc", 10, 12);
        assert_eq!(padded.chars().count(), 12);
        assert!(padded.ends_with('│'));

        let cut = Logger::truncate_with_padding("abcdefghijklmnop", 10, 12);
        assert!(cut.starts_with("abcdefg..."));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
