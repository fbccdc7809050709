//! Configuration schema definitions.
//!
//! [`FileConfig`] is what a TOML file may contain; every field is optional so
//! that the loader can tell "set in the file" from "not set". [`ProxyConfig`]
//! is the merged result with defaults applied.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8545;
pub const DEFAULT_URL: &str = "http://127.0.0.1:8040";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8041";
pub const DEFAULT_RPM: u32 = 1000;
/// 60 gwei.
pub const DEFAULT_MIN_GAS_PRICE: u64 = 60_000_000_000;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Contents of a TOML configuration file.
///
/// Snake-case keys are canonical; the PascalCase keys of older deployments
/// (`Port`, `URL`, `WSURL`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(alias = "Port")]
    pub port: Option<u16>,

    /// Upstream JSON-RPC HTTP origin.
    #[serde(alias = "URL")]
    pub url: Option<String>,

    /// Upstream WebSocket origin.
    #[serde(alias = "WSURL")]
    pub ws_url: Option<String>,

    /// Allowed method names or `prefix*` patterns.
    #[serde(alias = "Allow", default)]
    pub allow: Vec<String>,

    /// Requests per minute per client IP.
    #[serde(alias = "RPM")]
    pub rpm: Option<u32>,

    /// Client IPs exempt from rate limiting.
    #[serde(alias = "NoLimit", default)]
    pub no_limit: Vec<String>,

    #[serde(alias = "BlockRangeLimit")]
    pub block_range_limit: Option<u64>,

    /// Minimum gas price in wei.
    #[serde(alias = "MinGasPrice")]
    pub min_gas_price: Option<u64>,

    pub request_timeout_secs: Option<u64>,
    pub max_body_bytes: Option<usize>,
    pub limiter_idle_ttl_secs: Option<u64>,
    pub trust_forwarded_for: Option<bool>,

    pub metrics_address: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

/// Fully resolved proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyConfig {
    /// Port to listen on (all interfaces).
    pub port: u16,

    /// Upstream JSON-RPC HTTP origin.
    pub url: String,

    /// Upstream WebSocket origin.
    pub ws_url: String,

    /// Allowed method patterns; empty allows every method.
    pub allow: Vec<String>,

    /// Requests per minute per client IP; 0 disables limiting.
    pub rpm: u32,

    /// Client IPs exempt from rate limiting.
    pub no_limit: Vec<String>,

    /// Maximum `toBlock - fromBlock` for range queries; 0 disables.
    pub block_range_limit: u64,

    /// Minimum gas price in wei for raw transactions; 0 disables.
    pub min_gas_price: u64,

    /// Upstream round-trip timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body the proxy will buffer for inspection.
    pub max_body_bytes: usize,

    /// Idle time after which a client's rate-limit bucket may be dropped; 0 keeps buckets forever.
    pub limiter_idle_ttl_secs: u64,

    /// Take the client IP from `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,

    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            url: DEFAULT_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            allow: Vec::new(),
            rpm: DEFAULT_RPM,
            no_limit: Vec::new(),
            block_range_limit: 0,
            min_gas_price: DEFAULT_MIN_GAS_PRICE,
            request_timeout_secs: 30,
            max_body_bytes: 5 * 1024 * 1024,
            limiter_idle_ttl_secs: 600,
            trust_forwarded_for: false,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Prometheus endpoint bind address; disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
