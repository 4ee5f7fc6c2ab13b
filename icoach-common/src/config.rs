//! Configuration loading and config file resolution
//!
//! Every field of [`TomlConfig`] has a default, so a missing or partial
//! config file degrades to defaults instead of aborting startup.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ICOACH_CONFIG";

/// Default listen address for the icoach-ai service
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Top-level TOML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    /// Provider API key (lowest priority source, see `icoach_ai::config`)
    pub gemini_api_key: Option<String>,
    pub bind_address: Option<String>,
    pub models: ModelTable,
    pub queue: QueueSettings,
    /// Retry settings for calls routed through the shared queue
    pub retry: RetrySettings,
    /// Retry settings for the direct (queue-bypassing) primary evaluation call
    #[serde(deserialize_with = "deserialize_primary_retry")]
    pub primary_retry: RetrySettings,
    pub provider: ProviderSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            gemini_api_key: None,
            bind_address: None,
            models: ModelTable::default(),
            queue: QueueSettings::default(),
            retry: RetrySettings::default(),
            primary_retry: RetrySettings::primary_defaults(),
            provider: ProviderSettings::default(),
        }
    }
}

impl TomlConfig {
    /// Listen address, falling back to [`DEFAULT_BIND_ADDRESS`]
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Model identifier per call purpose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTable {
    pub extraction: String,
    pub evaluation_primary: String,
    pub evaluation_fallback: String,
    pub transcription: String,
    pub research: String,
    /// Thinking effort hint for the primary evaluation call
    pub primary_thinking_budget: Option<i32>,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            extraction: "gemini-2.5-flash".to_string(),
            evaluation_primary: "gemini-2.5-pro".to_string(),
            evaluation_fallback: "gemini-2.5-flash".to_string(),
            transcription: "gemini-2.5-flash".to_string(),
            research: "gemini-2.5-flash".to_string(),
            primary_thinking_budget: Some(4096),
        }
    }
}

/// Shared request queue limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    pub min_spacing_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_spacing_ms: 500,
        }
    }
}

/// Retry/backoff limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetrySettings {
    /// Defaults for the heavier primary evaluation call
    pub fn primary_defaults() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 5000,
            max_delay_ms: 30000,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30000,
        }
    }
}

/// `[primary_retry]` as written in the file; absent keys take the primary
/// profile, not the queue-tier [`RetrySettings`] defaults
#[derive(Deserialize)]
#[serde(default)]
struct PrimaryRetryTable {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Default for PrimaryRetryTable {
    fn default() -> Self {
        let defaults = RetrySettings::primary_defaults();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
        }
    }
}

fn deserialize_primary_retry<'de, D>(
    deserializer: D,
) -> std::result::Result<RetrySettings, D::Error>
where
    D: Deserializer<'de>,
{
    let table = PrimaryRetryTable::deserialize(deserializer)?;
    Ok(RetrySettings {
        max_retries: table.max_retries,
        base_delay_ms: table.base_delay_ms,
        max_delay_ms: table.max_delay_ms,
    })
}

/// Provider endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    /// Per-call timeout; bounds how long one in-flight call can hold a queue slot
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl TomlConfig {
    /// Built-in defaults, used when no config file exists
    pub fn with_defaults() -> Self {
        Self::default()
    }
}

/// Resolve the config file path
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ICOACH_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/icoach/<module>.toml`)
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("icoach").join(format!("{}.toml", module_name)))
}

/// Load TOML config from `path`
///
/// A missing file logs a warning and yields defaults. A file that exists
/// but does not parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        return Ok(TomlConfig::with_defaults());
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_toml_config(&content)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Parse TOML config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)?;

    if config.queue.max_concurrent == 0 {
        return Err(Error::Config(
            "queue.max_concurrent must be at least 1".to_string(),
        ));
    }

    Ok(config)
}
