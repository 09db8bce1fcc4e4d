//! Application configuration loading for CLI and server defaults.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use spec_fetch_core::fetch::FetchPolicy;
use spec_fetch_core::pipeline::PipelineSettings;
use spec_fetch_core::server::{ServerSettings, body_limit_for};

/// Largest configurable byte limit (64 MiB).
const MAX_CONFIGURABLE_BYTES: u64 = 64 * 1024 * 1024;

/// TOML-backed file configuration for spec-fetch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default listen address for `serve`.
    pub bind: Option<SocketAddr>,
    /// Permits per caller bucket.
    pub rate_limit_capacity: Option<u32>,
    /// Seconds to regain one permit.
    pub rate_limit_refill_secs: Option<u64>,
    /// Upper bound on tracked callers.
    pub rate_limit_max_buckets: Option<usize>,
    /// Wall-clock fetch budget in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Raw spec size limit in bytes.
    pub max_source_bytes: Option<u64>,
    /// Parsed document size limit in bytes.
    pub max_document_bytes: Option<u64>,
    /// Identify callers by `X-Forwarded-For`.
    pub trust_forwarded_header: Option<bool>,
    /// Permit loopback/private hosts. Local development only.
    pub allow_private_hosts: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(capacity) = self.rate_limit_capacity
            && !(1..=10_000).contains(&capacity)
        {
            bail!(
                "Invalid config value for `rate_limit_capacity`: {capacity}. Expected range: 1..=10000"
            );
        }
        validate_secs("rate_limit_refill_secs", self.rate_limit_refill_secs, 3600)?;
        validate_secs("fetch_timeout_secs", self.fetch_timeout_secs, 300)?;

        if let Some(buckets) = self.rate_limit_max_buckets
            && !(1..=1_000_000).contains(&buckets)
        {
            bail!(
                "Invalid config value for `rate_limit_max_buckets`: {buckets}. Expected range: 1..=1000000"
            );
        }

        validate_bytes("max_source_bytes", self.max_source_bytes)?;
        validate_bytes("max_document_bytes", self.max_document_bytes)?;

        Ok(())
    }

    /// Applies file values over the built-in pipeline defaults.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let defaults = PipelineSettings::default();
        PipelineSettings {
            rate_limit_capacity: self
                .rate_limit_capacity
                .unwrap_or(defaults.rate_limit_capacity),
            rate_limit_refill: self
                .rate_limit_refill_secs
                .map_or(defaults.rate_limit_refill, Duration::from_secs),
            rate_limit_max_buckets: self
                .rate_limit_max_buckets
                .unwrap_or(defaults.rate_limit_max_buckets),
            rate_limit_disabled: false,
            fetch: FetchPolicy {
                timeout: self
                    .fetch_timeout_secs
                    .map_or(defaults.fetch.timeout, Duration::from_secs),
                max_bytes: self.max_source_bytes.unwrap_or(defaults.fetch.max_bytes),
                allow_private_hosts: self
                    .allow_private_hosts
                    .unwrap_or(defaults.fetch.allow_private_hosts),
            },
            max_document_bytes: self
                .max_document_bytes
                .unwrap_or(defaults.max_document_bytes),
        }
    }

    /// Returns server options derived from file values.
    #[must_use]
    pub fn server_settings(&self, settings: &PipelineSettings) -> ServerSettings {
        ServerSettings {
            trust_forwarded_header: self
                .trust_forwarded_header
                .unwrap_or(ServerSettings::default().trust_forwarded_header),
            body_limit: body_limit_for(settings.fetch.max_bytes),
        }
    }
}

fn validate_secs(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

fn validate_bytes(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1024..=MAX_CONFIGURABLE_BYTES).contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: 1024..={MAX_CONFIGURABLE_BYTES}"
        );
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config, or defaults when no file was read.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/spec-fetch/config.toml`
/// 2. `$HOME/.config/spec-fetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("spec-fetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("spec-fetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit`, or from the default path if present.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
