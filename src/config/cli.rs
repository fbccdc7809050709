//! Command-line flags.

use clap::Parser;
use std::path::PathBuf;

use crate::config::schema::LogFormat;

/// A policy-enforcing proxy for web3 JSON-RPC.
///
/// Every setting may come from a flag or from the TOML file given with
/// `--config`, but not from both.
#[derive(Debug, Default, Parser)]
#[command(name = "rpc-proxy", version, about, long_about = None)]
pub struct Cli {
    /// Path to TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to serve [default: 8545]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Upstream JSON-RPC URL [default: http://127.0.0.1:8040]
    #[arg(short, long)]
    pub url: Option<String>,

    /// Upstream WebSocket URL [default: ws://127.0.0.1:8041]
    #[arg(short = 'w', long = "wsurl")]
    pub ws_url: Option<String>,

    /// Comma separated list of allowed methods (`prefix*` wildcards allowed)
    #[arg(short, long, value_delimiter = ',')]
    pub allow: Vec<String>,

    /// Limit for number of requests per minute from a single IP [default: 1000]
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Comma separated list of IPs allowed unlimited requests
    #[arg(short = 'n', long = "nolimit", value_delimiter = ',')]
    pub no_limit: Vec<String>,

    /// Block range query limit
    #[arg(short = 'b', long = "blocklimit")]
    pub block_range_limit: Option<u64>,

    /// Minimum gas price in wei a submitted transaction must pay [default: 60000000000]
    #[arg(short = 'm', long = "mingasprice")]
    pub min_gas_price: Option<u64>,

    /// Prometheus metrics listen address, e.g. 0.0.0.0:9090
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Log level [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Use the first X-Forwarded-For entry as the client IP
    #[arg(long)]
    pub trust_forwarded_for: bool,
}
