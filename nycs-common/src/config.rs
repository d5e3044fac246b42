//! Configuration loading and layered resolution
//!
//! Resolution order (highest priority first):
//! 1. Command-line flags (applied by the binary after `resolve()`)
//! 2. Environment variables (`NYCS_*`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing default config file is not an error: the browser logs a warning
//! and starts with compiled defaults. A config file named explicitly (flag or
//! `NYCS_CONFIG`) must exist and parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// NYC open-data portal
pub const DEFAULT_BASE_URL: &str = "https://data.cityofnewyork.us";
/// "DOE High School Directory" dataset id
pub const DEFAULT_SCHOOLS_DATASET: &str = "s3k6-pzi2";
/// "SAT Results" dataset id
pub const DEFAULT_SCORES_DATASET: &str = "f9bf-2cp4";

pub const ENV_CONFIG_PATH: &str = "NYCS_CONFIG";
pub const ENV_BASE_URL: &str = "NYCS_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "NYCS_REQUEST_TIMEOUT_SECS";
pub const ENV_SEARCH_DEBOUNCE_MS: &str = "NYCS_SEARCH_DEBOUNCE_MS";
pub const ENV_LOG_LEVEL: &str = "NYCS_LOG_LEVEL";

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Open-data API endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub schools_dataset: String,
    pub scores_dataset: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            schools_dataset: DEFAULT_SCHOOLS_DATASET.to_string(),
            scores_dataset: DEFAULT_SCORES_DATASET.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ApiConfig {
    /// `{base_url}/resource/{schools_dataset}.json`
    pub fn schools_url(&self) -> String {
        self.resource_url(&self.schools_dataset)
    }

    /// `{base_url}/resource/{scores_dataset}.json`
    pub fn scores_url(&self) -> String {
        self.resource_url(&self.scores_dataset)
    }

    fn resource_url(&self, dataset: &str) -> String {
        format!(
            "{}/resource/{}.json",
            self.base_url.trim_end_matches('/'),
            dataset
        )
    }
}

/// Search behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Delay before a keystroke's filter runs; 0 filters immediately
    pub debounce_ms: u64,
    /// Also match the query against the expanded borough name
    pub match_borough_name: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Serialize a config to TOML and write it to `path`
pub fn write_toml_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Platform config file location (`~/.config/nycs/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nycs").join("config.toml"))
}

/// Apply `NYCS_*` overrides using `lookup` to read variables
///
/// Split from [`apply_env_overrides`] so callers can supply their own source.
pub fn apply_overrides_from<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_BASE_URL) {
        config.api.base_url = url;
    }

    if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
        config.api.request_timeout_secs = Some(parse_number(ENV_REQUEST_TIMEOUT_SECS, &raw)?);
    }

    if let Some(raw) = lookup(ENV_SEARCH_DEBOUNCE_MS) {
        config.search.debounce_ms = parse_number(ENV_SEARCH_DEBOUNCE_MS, &raw)?;
    }

    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }

    Ok(())
}

/// Apply `NYCS_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got {:?}", key, raw)))
}

/// Resolves the effective configuration from file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` as the config file (from a command-line flag)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit_path: Some(path.into()),
        }
    }

    /// Load the config file (if any) then apply environment overrides
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config)?;
        debug!(?config, "Configuration resolved");
        Ok(config)
    }

    fn load_file(&self) -> Result<AppConfig> {
        // Priority 1: explicit path from the command line
        if let Some(path) = &self.explicit_path {
            info!("Loading config from {}", path.display());
            return load_toml_config(path);
        }

        // Priority 2: NYCS_CONFIG environment variable
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(path);
            info!("Loading config from {} ({})", path.display(), ENV_CONFIG_PATH);
            return load_toml_config(&path);
        }

        // Priority 3: platform default location, optional
        match default_config_path() {
            Some(path) if path.exists() => match load_toml_config(&path) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    warn!("Ignoring unreadable config file {}: {}", path.display(), e);
                    Ok(AppConfig::default())
                }
            },
            _ => {
                debug!("No config file found, using compiled defaults");
                Ok(AppConfig::default())
            }
        }
    }
}
