//! Configuration for the `taskledger` demo driver.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskledger/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ledger::{DEFAULT_GAS_MULTIPLIER_PERCENT, GasPolicy};
use crate::orchestrator::{OrchestratorConfig, ResyncPolicy};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    ledger: LedgerFileConfig,
    resync: ResyncFileConfig,
    notify: NotifyFileConfig,
}

/// `[ledger]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LedgerFileConfig {
    identity: Option<String>,
    gas_multiplier_percent: Option<u64>,
    settle_latency_ms: Option<u64>,
}

/// `[resync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ResyncFileConfig {
    delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_interval_ms: Option<u64>,
}

/// `[notify]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NotifyFileConfig {
    buffer: Option<usize>,
    explorer_base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Signing identity for the demo ledger.
    pub identity: String,
    /// Gas ceiling multiplier in percent.
    pub gas_multiplier_percent: u64,
    /// Settlement latency of the demo ledger.
    pub settle_latency: Duration,
    /// Delay before the post-write resync.
    pub resync_delay: Duration,
    /// Reads per resync before giving up on the expected state.
    pub resync_max_attempts: u32,
    /// Wait between resync reads.
    pub resync_retry_interval: Duration,
    /// Capacity of the notification channel.
    pub notification_buffer: usize,
    /// Block explorer base URL for transaction links.
    pub explorer_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let resync = ResyncPolicy::default();
        let orchestrator = OrchestratorConfig::default();
        Self {
            identity: "0xa11ce".to_string(),
            gas_multiplier_percent: DEFAULT_GAS_MULTIPLIER_PERCENT,
            settle_latency: Duration::from_millis(1_500),
            resync_delay: resync.delay,
            resync_max_attempts: resync.max_attempts,
            resync_retry_interval: resync.retry_interval,
            notification_buffer: orchestrator.notification_buffer,
            explorer_base_url: orchestrator.explorer_base_url,
        }
    }
}

impl AppConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or if any config file that exists cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            identity: cli
                .identity
                .clone()
                .or_else(|| file.ledger.identity.clone())
                .unwrap_or(defaults.identity),
            gas_multiplier_percent: file
                .ledger
                .gas_multiplier_percent
                .unwrap_or(defaults.gas_multiplier_percent),
            settle_latency: file
                .ledger
                .settle_latency_ms
                .map_or(defaults.settle_latency, Duration::from_millis),
            resync_delay: cli
                .resync_delay_ms
                .or(file.resync.delay_ms)
                .map_or(defaults.resync_delay, Duration::from_millis),
            resync_max_attempts: file
                .resync
                .max_attempts
                .unwrap_or(defaults.resync_max_attempts),
            resync_retry_interval: file
                .resync
                .retry_interval_ms
                .map_or(defaults.resync_retry_interval, Duration::from_millis),
            notification_buffer: file
                .notify
                .buffer
                .unwrap_or(defaults.notification_buffer),
            explorer_base_url: file
                .notify
                .explorer_base_url
                .clone()
                .unwrap_or(defaults.explorer_base_url),
        }
    }

    /// Settings for the orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            gas: GasPolicy {
                multiplier_percent: self.gas_multiplier_percent,
            },
            resync: ResyncPolicy {
                delay: self.resync_delay,
                max_attempts: self.resync_max_attempts,
                retry_interval: self.resync_retry_interval,
            },
            notification_buffer: self.notification_buffer,
            explorer_base_url: self.explorer_base_url.clone(),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Optimistic task ledger client (demo driver)")]
pub struct CliArgs {
    /// Signing identity (wallet address) for the demo ledger.
    #[arg(long, env = "TASKLEDGER_IDENTITY")]
    pub identity: Option<String>,

    /// Path to config file (default: `~/.config/taskledger/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Delay before the post-write resync, in milliseconds.
    #[arg(long)]
    pub resync_delay_ms: Option<u64>,

    /// Print the final views as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKLEDGER_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskledger.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// path is tried and a missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit_path {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskledger").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
