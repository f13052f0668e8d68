//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/swarfarm-logger/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/swarfarm-logger/` (~/.config/swarfarm-logger/)
//! - State/Logs: `$XDG_STATE_HOME/swarfarm-logger/` (~/.local/state/swarfarm-logger/)

use crate::credential::Credential;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const APP_DIR: &str = "swarfarm-logger";

/// Prefix of the daily log files; each day's file gets a `.YYYY-MM-DD` suffix
pub const LOG_FILE_PREFIX: &str = "swarfarm-logger.log";

/// Default SWARFARM API root
pub const DEFAULT_SERVER_URL: &str = "https://swarfarm.com/api/v2/";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// SWARFARM integration settings
    #[serde(default)]
    pub swarfarm: SwarfarmConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SWARFARM integration configuration
///
/// Mirrors the plugin settings exposed by the host: `enabled`,
/// `profile_sync` and `api_key`, plus transport and timer tuning.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SwarfarmConfig {
    /// Gates whether the relay initializes at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Upload the account profile on every login
    #[serde(default, alias = "profileSync")]
    pub profile_sync: bool,

    /// A single API key, or a table of account id -> API key
    #[serde(default, alias = "apiKey")]
    pub api_key: Credential,

    /// API root all endpoint paths are resolved against
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Seconds between accepted-command refreshes
    #[serde(default = "default_command_refresh")]
    pub command_refresh_secs: u64,

    /// Milliseconds between upload job status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Seconds before an upload job is abandoned
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for SwarfarmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            profile_sync: false,
            api_key: Credential::default(),
            server_url: default_server_url(),
            timeout_secs: default_timeout(),
            command_refresh_secs: default_command_refresh(),
            poll_interval_ms: default_poll_interval(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_command_refresh() -> u64 {
    60 * 60
}

fn default_poll_interval() -> u64 {
    2500
}

fn default_job_timeout() -> u64 {
    300
}

impl SwarfarmConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("https://") || self.server_url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "swarfarm.server_url must be an http(s) URL, got {:?}",
                self.server_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "swarfarm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.command_refresh_secs == 0 {
            return Err(Error::Config(
                "swarfarm.command_refresh_secs must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.job_timeout_secs == 0 {
            return Err(Error::Config(
                "swarfarm.poll_interval_ms and swarfarm.job_timeout_secs must be greater than 0"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Interval of the accepted-command refresh timer
    pub fn command_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.command_refresh_secs)
    }

    /// Interval of the job status poll timer
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Failsafe window for a single upload job
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Shared handle to the host's live plugin settings
///
/// The relay never caches the credential: it reads a snapshot from here for
/// every event and every job status poll, so edits apply to the next one.
#[derive(Debug, Clone, Default)]
pub struct LiveConfig {
    inner: Arc<RwLock<SwarfarmConfig>>,
}

impl LiveConfig {
    /// Wrap settings, trimming a plain-string API key
    pub fn new(mut config: SwarfarmConfig) -> Self {
        config.api_key = config.api_key.trimmed();
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> SwarfarmConfig {
        self.inner.read().clone()
    }

    /// Copy of the current credential
    pub fn credential(&self) -> Credential {
        self.inner.read().api_key.clone()
    }

    pub fn profile_sync(&self) -> bool {
        self.inner.read().profile_sync
    }

    /// Change the API key in place
    pub fn set_api_key(&self, credential: Credential) {
        self.inner.write().api_key = credential.trimmed();
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.swarfarm.api_key = config.swarfarm.api_key.trimmed();
        config.swarfarm.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/swarfarm-logger/config.toml` (~/.config/swarfarm-logger/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/swarfarm-logger/` (~/.local/state/swarfarm-logger/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    /// Returns the path of today's log file
    ///
    /// Files rotate at midnight UTC.
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(format!(
            "{}.{}",
            LOG_FILE_PREFIX,
            chrono::Utc::now().format("%Y-%m-%d")
        ))
    }
}
