//! Application configuration loading for CLI defaults.
//!
//! Values come from, in order of precedence: the command line, the config
//! file, built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use ikfetch_core::api::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
    READ_TIMEOUT_SECS,
};
use ikfetch_core::{DEFAULT_WORKERS, RetryPolicy, TransportConfig};

use crate::cli::Args;

/// Result pages per search request when nothing else is configured.
const DEFAULT_MAXPAGES: u32 = 1;

/// TOML-backed file configuration for ikfetch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Shared API token.
    pub token: Option<String>,
    /// Default data directory.
    pub datadir: Option<PathBuf>,
    /// Default worker count (same range as CLI).
    pub workers: Option<u16>,
    /// Default result pages per search request.
    pub maxpages: Option<u32>,
    /// API host.
    pub base_url: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Attempts per API call, including the first.
    pub retry_attempts: Option<u32>,
    /// Base retry delay in seconds; attempt `n` waits `n` times this.
    pub retry_delay_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=100).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..=100");
        }
        if let Some(maxpages) = self.maxpages
            && maxpages == 0
        {
            bail!("Invalid config value for `maxpages`: 0. Expected at least 1");
        }
        if let Some(retry_attempts) = self.retry_attempts
            && !(1..=10).contains(&retry_attempts)
        {
            bail!(
                "Invalid config value for `retry_attempts`: {retry_attempts}. Expected range: 1..=10"
            );
        }
        if let Some(retry_delay_secs) = self.retry_delay_secs
            && retry_delay_secs > 600
        {
            bail!(
                "Invalid config value for `retry_delay_secs`: {retry_delay_secs}. Expected range: 0..=600"
            );
        }
        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url)?;
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_base_url(value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).with_context(|| format!("Invalid base URL '{value}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid base URL '{value}': expected http or https");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/ikfetch/config.toml`
/// 2. `$HOME/.config/ikfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("ikfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("ikfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_file_config(&path).map(Some)
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Effective settings after merging command line, config file and defaults.
#[derive(Clone)]
pub struct Settings {
    pub token: String,
    pub datadir: PathBuf,
    pub workers: usize,
    pub maxpages: u32,
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("datadir", &self.datadir)
            .field("workers", &self.workers)
            .field("maxpages", &self.maxpages)
            .field("base_url", &self.base_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Merges `args` over `file` over defaults.
    ///
    /// # Errors
    ///
    /// Fails when no token or data directory is configured anywhere, or the
    /// base URL given on the command line is invalid.
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Result<Self> {
        let file = file.cloned().unwrap_or_default();

        let token = args
            .sharedtoken
            .clone()
            .or(file.token)
            .filter(|t| !t.trim().is_empty())
            .context("No API token: pass --sharedtoken, set IKFETCH_TOKEN, or add `token` to the config file")?;
        let datadir = args
            .datadir
            .clone()
            .or(file.datadir)
            .context("No data directory: pass --datadir or add `datadir` to the config file")?;
        let base_url = match &args.base_url {
            Some(url) => {
                validate_base_url(url)?;
                url.clone()
            }
            None => file.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let retry_attempts = file.retry_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let retry_delay = file
            .retry_delay_secs
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_secs);

        Ok(Self {
            token,
            datadir,
            workers: args
                .workers
                .or(file.workers)
                .map_or(DEFAULT_WORKERS, usize::from),
            maxpages: args.maxpages.or(file.maxpages).unwrap_or(DEFAULT_MAXPAGES),
            base_url,
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            retry_policy: RetryPolicy::new(retry_attempts, retry_delay),
        })
    }

    /// Transport settings derived from these settings.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::new(self.token.clone())
            .with_base_url(self.base_url.clone())
            .with_retry_policy(self.retry_policy.clone());
        config.connect_timeout_secs = self.connect_timeout_secs;
        config.read_timeout_secs = self.read_timeout_secs;
        config
    }
}
