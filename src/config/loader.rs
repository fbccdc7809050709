//! Configuration loading and merging.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::{FileConfig, ObservabilityConfig, ProxyConfig};
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The same setting was given as a flag and in the config file.
    #[error("{0} set in two places")]
    Conflict(&'static str),

    #[error("Validation failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Validation(Vec<ValidationError>),
}

/// Read a TOML config file.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load the file named by `--config` (if any) and merge it with the flags.
pub fn load(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let file = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };
    resolve(cli, file)
}

/// Merge flags and file contents, then apply defaults.
///
/// A setting present in both sources is an error rather than a silent override.
pub fn resolve(cli: &Cli, file: FileConfig) -> Result<ProxyConfig, ConfigError> {
    let defaults = ProxyConfig::default();
    let observability = ObservabilityConfig::default();

    Ok(ProxyConfig {
        port: pick("port", cli.port, file.port)?.unwrap_or(defaults.port),
        url: pick("url", cli.url.clone(), file.url)?.unwrap_or(defaults.url),
        ws_url: pick("ws url", cli.ws_url.clone(), file.ws_url)?.unwrap_or(defaults.ws_url),
        allow: pick("allow", non_empty(&cli.allow), non_empty(&file.allow))?.unwrap_or_default(),
        rpm: pick("rpm", cli.rpm, file.rpm)?.unwrap_or(defaults.rpm),
        no_limit: pick("nolimit", non_empty(&cli.no_limit), non_empty(&file.no_limit))?
            .unwrap_or_default(),
        block_range_limit: pick(
            "block range limit",
            cli.block_range_limit,
            file.block_range_limit,
        )?
        .unwrap_or(defaults.block_range_limit),
        min_gas_price: pick("min gas price", cli.min_gas_price, file.min_gas_price)?
            .unwrap_or(defaults.min_gas_price),
        request_timeout_secs: file
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
        max_body_bytes: file.max_body_bytes.unwrap_or(defaults.max_body_bytes),
        limiter_idle_ttl_secs: file
            .limiter_idle_ttl_secs
            .unwrap_or(defaults.limiter_idle_ttl_secs),
        trust_forwarded_for: pick(
            "trust forwarded for",
            cli.trust_forwarded_for.then_some(true),
            file.trust_forwarded_for,
        )?
        .unwrap_or(defaults.trust_forwarded_for),
        observability: ObservabilityConfig {
            log_level: pick("log level", cli.log_level.clone(), file.log_level)?
                .unwrap_or(observability.log_level),
            log_format: pick("log format", cli.log_format, file.log_format)?
                .unwrap_or(observability.log_format),
            metrics_address: pick(
                "metrics address",
                cli.metrics_address.clone(),
                file.metrics_address,
            )?,
        },
    })
}

fn pick<T>(field: &'static str, flag: Option<T>, file: Option<T>) -> Result<Option<T>, ConfigError> {
    match (flag, file) {
        (Some(_), Some(_)) => Err(ConfigError::Conflict(field)),
        (flag, file) => Ok(flag.or(file)),
    }
}

/// Lists count as unset when empty or made only of blank entries.
fn non_empty(list: &[String]) -> Option<Vec<String>> {
    let list: Vec<String> = list
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!list.is_empty()).then_some(list)
}
