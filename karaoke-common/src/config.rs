//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not fatal: a warning is logged and compiled
//! defaults are used. A TOML file that exists but does not parse is a
//! configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "KARAOKE_CONFIG";
/// Environment variable naming the SQLite database file
pub const ENV_DATABASE_PATH: &str = "KARAOKE_DATABASE";
/// Environment variable carrying the forced-alignment API key
pub const ENV_ALIGNMENT_API_KEY: &str = "KARAOKE_ALIGNMENT_API_KEY";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative or absolute)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub alignment: AlignmentSettings,

    #[serde(default)]
    pub separation: SeparationSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Retry, backoff and timeout policy for the task engine
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Attempts allowed before a task is permanently excluded
    pub max_attempts: u32,
    /// Backoff base; the delay after attempt `n` is `base * 2^n`
    pub backoff_base_secs: u64,
    /// Upper bound on any single backoff delay
    pub backoff_cap_secs: u64,
    /// Hard limit on one `process` call
    pub process_timeout_secs: u64,
    /// `Running` rows untouched for this long are treated as abandoned
    pub stale_running_secs: u64,
    /// Batch size when `--limit` is not given
    pub default_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 60,
            backoff_cap_secs: 86_400,
            process_timeout_secs: 600,
            stale_running_secs: 3_600,
            default_limit: 10,
        }
    }
}

impl EngineSettings {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    pub fn stale_running(&self) -> Duration {
        Duration::from_secs(self.stale_running_secs)
    }

    /// Reject values that would make the engine spin or never retry
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("engine.max_attempts must be at least 1".to_string()));
        }
        if self.process_timeout_secs == 0 {
            return Err(Error::Config(
                "engine.process_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.backoff_cap_secs < self.backoff_base_secs {
            return Err(Error::Config(format!(
                "engine.backoff_cap_secs ({}) is smaller than engine.backoff_base_secs ({})",
                self.backoff_cap_secs, self.backoff_base_secs
            )));
        }
        // Recovery must not reclaim a row whose handler can still be inside its time limit
        if self.stale_running_secs <= self.process_timeout_secs {
            return Err(Error::Config(format!(
                "engine.stale_running_secs ({}) must be greater than engine.process_timeout_secs ({})",
                self.stale_running_secs, self.process_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Forced-alignment service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlignmentSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Language of the stored lyric lines that get aligned
    pub source_language: String,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io/v1/forced-alignment".to_string(),
            api_key: None,
            source_language: "en".to_string(),
        }
    }
}

/// Source-separation service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SeparationSettings {
    pub base_url: String,
    pub model: String,
    pub output_format: String,
    pub mp3_bitrate: u32,
}

impl Default for SeparationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            model: "mdx_q".to_string(),
            output_format: "mp3".to_string(),
            mp3_bitrate: 192,
        }
    }
}

/// Object storage connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    pub base_url: String,
    pub chain_id: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.grove.storage/".to_string(),
            chain_id: 37111,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Apply environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_ALIGNMENT_API_KEY) {
            if !key.trim().is_empty() {
                self.alignment.api_key = Some(key);
            }
        }
    }
}

/// Load TOML config from `path`
///
/// Missing file → warning + defaults. Present but invalid → `Error::Config`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    config.engine.validate()?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve which config file to read
///
/// Returns `None` only when no platform config directory exists and neither
/// CLI nor environment named a file.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|d| d.join("karaoke").join("config.toml"))
}

/// Resolve the database file path
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_DATABASE_PATH) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.database_path {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_database_path()
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("karaoke").join("karaoke.db"))
        .unwrap_or_else(|| PathBuf::from("./karaoke_data/karaoke.db"))
}
