//! Configuration file support for patchloop.
//!
//! Settings come from `patchloop.toml` in the working directory and from
//! `config.toml` in the user's patchloop config directory. Both are optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use patchloop_agent::{AgentConfig, AgentType};
use patchloop_audit::AuditRole;
use patchloop_core::LoopSettings;

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "patchloop.toml";
/// Directory under the platform config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "patchloop";
/// The global config file name
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Settings read from a config file
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default provider for both roles ("openai" or "anthropic")
    pub provider: Option<String>,
    /// Default model for both roles
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per-request timeout, e.g. "90s"
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub max_iterations: Option<usize>,
    /// Pause before each call, e.g. "1s"
    #[serde(default, with = "humantime_serde")]
    pub call_delay: Option<Duration>,
    #[serde(default)]
    pub scanner: RoleConfig,
    #[serde(default)]
    pub patcher: RoleConfig,
}

/// Overrides for a single role
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
}

impl FileConfig {
    /// Load `patchloop.toml` from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load_project(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_from(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Load the global config, if the platform has a config directory
    pub fn load_global() -> Result<Option<Self>> {
        match Self::global_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
    }

    pub fn load_from(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    fn role(&self, role: AuditRole) -> &RoleConfig {
        match role {
            AuditRole::Scanner => &self.scanner,
            AuditRole::Patcher => &self.patcher,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub provider: Option<AgentType>,
    pub model: Option<String>,
    pub scanner_model: Option<String>,
    pub patcher_model: Option<String>,
    pub base_url: Option<String>,
    pub max_iterations: Option<usize>,
}

/// Backend and call settings for one role
#[derive(Debug, Clone)]
pub struct RoleSettings {
    pub agent_type: AgentType,
    pub agent_config: AgentConfig,
}

/// Fully resolved settings for a run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub scanner: RoleSettings,
    pub patcher: RoleSettings,
    pub loop_settings: LoopSettings,
}

impl ResolvedConfig {
    /// Merge CLI overrides with the project and global files.
    ///
    /// Priority: CLI flag > project role table > project top level >
    /// global role table > global top level > built-in default.
    /// API keys are not read here.
    pub fn resolve(
        cli: &CliOverrides,
        project: Option<&FileConfig>,
        global: Option<&FileConfig>,
    ) -> Result<Self> {
        let layers: Vec<&FileConfig> = project.into_iter().chain(global).collect();

        let max_iterations = cli
            .max_iterations
            .or_else(|| layers.iter().find_map(|c| c.max_iterations))
            .unwrap_or(patchloop_core::DEFAULT_MAX_ITERATIONS);
        let call_delay = layers
            .iter()
            .find_map(|c| c.call_delay)
            .unwrap_or(Duration::ZERO);

        Ok(Self {
            scanner: resolve_role(AuditRole::Scanner, cli, &layers)?,
            patcher: resolve_role(AuditRole::Patcher, cli, &layers)?,
            loop_settings: LoopSettings::new(max_iterations).with_call_delay(call_delay),
        })
    }
}

/// First value found walking the layers in priority order, role table first
fn lookup<T>(
    layers: &[&FileConfig],
    role: AuditRole,
    from_role: impl Fn(&RoleConfig) -> Option<T>,
    from_top: impl Fn(&FileConfig) -> Option<T>,
) -> Option<T> {
    layers
        .iter()
        .find_map(|&c| from_role(c.role(role)).or_else(|| from_top(c)))
}

fn resolve_role(
    role: AuditRole,
    cli: &CliOverrides,
    layers: &[&FileConfig],
) -> Result<RoleSettings> {
    let agent_type = match cli.provider {
        Some(provider) => provider,
        None => match lookup(layers, role, |r| r.provider.clone(), |c| c.provider.clone()) {
            Some(name) => name
                .parse::<AgentType>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid provider for the {}", role))?,
            None => AgentType::OpenAiCompat,
        },
    };

    let mut config = AgentConfig::for_type(agent_type);

    let role_model = match role {
        AuditRole::Scanner => cli.scanner_model.clone(),
        AuditRole::Patcher => cli.patcher_model.clone(),
    };
    if let Some(model) = role_model
        .or_else(|| cli.model.clone())
        .or_else(|| lookup(layers, role, |r| r.model.clone(), |c| c.model.clone()))
    {
        config = config.with_model(model);
    }

    if let Some(base_url) = cli
        .base_url
        .clone()
        .or_else(|| lookup(layers, role, |r| r.base_url.clone(), |c| c.base_url.clone()))
    {
        config = config.with_base_url(base_url);
    }

    if let Some(env_var) = lookup(
        layers,
        role,
        |r| r.api_key_env.clone(),
        |c| c.api_key_env.clone(),
    ) {
        config.api_key_env = env_var;
    }

    if let Some(temperature) = lookup(layers, role, |r| r.temperature, |c| c.temperature) {
        config = config.with_temperature(temperature);
    }

    if let Some(max_tokens) = layers.iter().find_map(|c| c.max_tokens) {
        config.max_tokens = max_tokens;
    }

    if let Some(timeout) = layers.iter().find_map(|c| c.timeout) {
        config = config.with_timeout(timeout);
    }

    Ok(RoleSettings {
        agent_type,
        agent_config: config,
    })
}
