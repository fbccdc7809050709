//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command-line flags (cli.rs)      TOML file (schema.rs)
//!              \                    /
//!               → loader.rs (merge, reject settings given twice, defaults)
//!               → ProxyConfig
//!               → validation.rs (URLs, patterns, exempt IPs)
//!               → PolicyConfig (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow an empty config
//! - Validation separates syntactic (serde/clap) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load, ConfigError};
pub use schema::{FileConfig, LogFormat, ObservabilityConfig, ProxyConfig};
pub use validation::{PolicyConfig, ValidationError};
