mod config;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use patchloop_agent::{create_agent, AgentType};
use patchloop_audit::{preview, LlmPatcher, LlmScanner};
use patchloop_core::{RefinementLoop, RunResult, RunStatus, FAILURE_EXIT_CODE};
use patchloop_logging::{init_tracing, LogFormat, Logger, SessionStartInfo, SessionWriter};

use crate::config::{CliOverrides, FileConfig, ResolvedConfig};

#[derive(Parser, Debug)]
#[command(
    name = "patchloop",
    about = "Scan code for exploitable vulnerabilities and patch it until it comes back clean",
    version,
    author
)]
struct Cli {
    /// File to audit ("-" reads stdin)
    file: Option<PathBuf>,

    /// Code to audit, given inline instead of a file
    #[arg(long, conflicts_with = "file")]
    code: Option<String>,

    /// Maximum patch rounds (default: 4)
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Provider for both scanner and patcher
    #[arg(long, value_enum)]
    provider: Option<ProviderChoice>,

    /// Model for both scanner and patcher
    #[arg(short, long)]
    model: Option<String>,

    /// Model for the scanner only
    #[arg(long)]
    scanner_model: Option<String>,

    /// Model for the patcher only
    #[arg(long)]
    patcher_model: Option<String>,

    /// Provider base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Diagnostic log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Append run events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write diagnostic logs to this file as well as stderr
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Print the final result as JSON instead of the bare artifact
    #[arg(long)]
    json_output: bool,

    /// Write the final artifact to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dry run: show the resolved settings without calling any model
    #[arg(long)]
    dry_run: bool,

    /// Do not write a session transcript
    #[arg(long)]
    no_session: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderChoice {
    Openai,
    Anthropic,
}

impl From<ProviderChoice> for AgentType {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Openai => AgentType::OpenAiCompat,
            ProviderChoice::Anthropic => AgentType::Anthropic,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let trace_guard = init_tracing(&cli.log_level, log_format, cli.trace_file.as_deref());

    let outcome = run(cli, log_format).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "patchloop failed");
        eprintln!("{} {:#}", "Error:".red().bold(), e);
    }
    let code = exit_code(&outcome);

    // process::exit skips destructors; flush the trace file first
    drop(trace_guard);
    std::process::exit(code);
}

/// Process exit code for a finished run or a hard error
fn exit_code(outcome: &Result<i32>) -> i32 {
    match outcome {
        Ok(code) => *code,
        Err(_) => FAILURE_EXIT_CODE,
    }
}

async fn run(cli: Cli, log_format: LogFormat) -> Result<i32> {
    let artifact = read_input(&cli)?;

    // Precedence: CLI flags > project config > global config > defaults
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let global_config = FileConfig::load_global().context("Failed to load global configuration")?;
    let project_config =
        FileConfig::load_project(&working_dir).context("Failed to load project configuration")?;
    let overrides = CliOverrides {
        provider: cli.provider.map(AgentType::from),
        model: cli.model.clone(),
        scanner_model: cli.scanner_model.clone(),
        patcher_model: cli.patcher_model.clone(),
        base_url: cli.base_url.clone(),
        max_iterations: cli.max_iterations,
    };
    let resolved = ResolvedConfig::resolve(
        &overrides,
        project_config.as_ref(),
        global_config.as_ref(),
    )?;

    if cli.dry_run {
        print_dry_run(&cli, &artifact, &resolved);
        return Ok(0);
    }

    let scanner_config = resolved.scanner.agent_config.clone().resolve_api_key_from_env();
    let patcher_config = resolved.patcher.agent_config.clone().resolve_api_key_from_env();

    let scanner_agent = create_agent(resolved.scanner.agent_type);
    let patcher_agent = create_agent(resolved.patcher.agent_type);

    if !scanner_agent.is_available(&scanner_config) {
        anyhow::bail!(
            "Scanner backend '{}' has no API key. Set {}.",
            scanner_agent.name(),
            scanner_config.api_key_env
        );
    }
    if !patcher_agent.is_available(&patcher_config) {
        anyhow::bail!(
            "Patcher backend '{}' has no API key. Set {}.",
            patcher_agent.name(),
            patcher_config.api_key_env
        );
    }

    let scanner = LlmScanner::new(scanner_agent.as_ref(), scanner_config);
    let patcher = LlmPatcher::new(patcher_agent.as_ref(), patcher_config);

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let mut runner = RefinementLoop::new(&scanner, &patcher, Arc::new(logger));

    if !cli.no_session {
        match SessionWriter::new(&artifact) {
            Ok(session) => {
                session.write_start(
                    &artifact,
                    &SessionStartInfo {
                        source: cli.file.as_deref().filter(|p| *p != Path::new("-")),
                        scanner_model: &resolved.scanner.agent_config.model,
                        patcher_model: &resolved.patcher.agent_config.model,
                        max_iterations: resolved.loop_settings.max_iterations,
                    },
                );
                tracing::debug!(path = %session.path().display(), "Writing session transcript");
                runner = runner.with_session(Arc::new(session));
            }
            Err(e) => tracing::warn!(error = %e, "Could not create session file"),
        }
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing the current call...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let result = runner.run(artifact, &resolved.loop_settings).await?;

    write_output(&cli, &result)?;
    print_outcome(&result);

    Ok(result.exit_code())
}

fn read_input(cli: &Cli) -> Result<String> {
    if let Some(ref code) = cli.code {
        return Ok(code.clone());
    }

    match cli.file.as_deref() {
        Some(path) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => anyhow::bail!("No input provided. Pass a FILE, '-' for stdin, or --code"),
    }
}

fn write_output(cli: &Cli, result: &RunResult) -> Result<()> {
    let rendered = if cli.json_output {
        serde_json::to_string_pretty(result)?
    } else {
        result.final_artifact.clone()
    };

    match &cli.output {
        Some(path) => std::fs::write(path, format!("{}\n", rendered))
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn print_dry_run(cli: &Cli, artifact: &str, resolved: &ResolvedConfig) {
    eprintln!("=== Dry Run ===");
    eprintln!(
        "Input: {} ({} lines, {} bytes)",
        cli.file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "--code".to_string()),
        artifact.lines().count(),
        artifact.len()
    );
    for (label, role) in [("Scanner", &resolved.scanner), ("Patcher", &resolved.patcher)] {
        eprintln!(
            "{}: {} {} at {} (key from {})",
            label,
            role.agent_type,
            role.agent_config.model,
            role.agent_config.base_url,
            role.agent_config.api_key_env
        );
    }
    eprintln!("Max iterations: {}", resolved.loop_settings.max_iterations);
    if !resolved.loop_settings.call_delay.is_zero() {
        eprintln!("Call delay: {:?}", resolved.loop_settings.call_delay);
    }
}

fn print_outcome(result: &RunResult) {
    eprintln!();
    match &result.status {
        RunStatus::Clean => {
            eprintln!("{}", "=== CLEAN ===".green().bold());
            eprintln!("No exploitable issues after {} patch round(s)", result.iterations);
        }
        RunStatus::Exhausted { residual_findings } => {
            eprintln!("{}", "=== INCOMPLETE ===".yellow().bold());
            eprintln!("Reached maximum patch rounds ({})", result.iterations);
            eprintln!("Remaining findings: {}", preview(residual_findings, 300));
        }
        RunStatus::Interrupted => {
            eprintln!("{}", "=== INTERRUPTED ===".yellow().bold());
            eprintln!("Stopped after {} patch round(s)", result.iterations);
        }
        RunStatus::Failed { error, .. } => {
            eprintln!("{}", "=== FAILED ===".red().bold());
            eprintln!("Error after {} patch round(s): {}", result.iterations, error);
        }
    }
    eprintln!("Calls: {} scan, {} patch", result.scanner_calls, result.patcher_calls);
    eprintln!("Duration: {:.1}s", result.total_duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchloop_core::LoopError;

    #[test]
    fn test_hard_errors_exit_like_failed_runs() {
        let missing_key: Result<i32> =
            Err(anyhow::anyhow!("Scanner backend 'openai' has no API key"));
        assert_eq!(exit_code(&missing_key), 2);

        let invalid: Result<i32> = Err(anyhow::Error::from(LoopError::InvalidConfiguration(
            "max_iterations must be at least 1".into(),
        )));
        assert_eq!(exit_code(&invalid), 2);
    }

    #[test]
    fn test_run_codes_pass_through() {
        assert_eq!(exit_code(&Ok(0)), 0);
        assert_eq!(exit_code(&Ok(1)), 1);
        assert_eq!(exit_code(&Ok(130)), 130);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let cli = Cli::parse_from(["patchloop"]);
        let err = read_input(&cli).unwrap_err();
        assert!(err.to_string().contains("No input provided"));
    }
}
