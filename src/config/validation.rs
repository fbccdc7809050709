//! Configuration validation.
//!
//! # Responsibilities
//! - Parse upstream origins and check their schemes
//! - Compile the method allow-list
//! - Canonicalize exempt IPs
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Output is the immutable [`PolicyConfig`] shared by every component

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::security::{MatcherError, MethodMatcher};

/// A single semantic problem in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must use one of {expected:?}, got {scheme:?}")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static [&'static str],
    },

    #[error(transparent)]
    InvalidPattern(#[from] MatcherError),

    #[error("invalid exempt IP {0:?}")]
    InvalidExemptIp(String),

    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Policy settings fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub upstream_url: Url,
    pub upstream_ws_url: Url,
    /// Sorted, deduplicated allow-list as configured.
    pub allow: Vec<String>,
    pub matcher: MethodMatcher,
    pub requests_per_minute: u32,
    /// Canonical textual form of each exempt IP.
    pub exempt: HashSet<String>,
    pub min_gas_price: u64,
    pub max_block_range: u64,
    pub trust_forwarded_for: bool,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub limiter_idle_ttl: Duration,
}

impl PolicyConfig {
    /// Validate a resolved configuration.
    pub fn from_proxy_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();

        let upstream_url = check_url("url", &config.url, &["http", "https"], &mut errors);
        let upstream_ws_url = check_url("ws url", &config.ws_url, &["ws", "wss"], &mut errors);

        let matcher = MethodMatcher::new(&config.allow)
            .map_err(|e| errors.push(e.into()))
            .ok();

        let mut exempt = HashSet::new();
        for ip in &config.no_limit {
            match ip.trim().parse::<IpAddr>() {
                Ok(addr) => {
                    exempt.insert(addr.to_string());
                }
                Err(_) => errors.push(ValidationError::InvalidExemptIp(ip.clone())),
            }
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::ZeroBodyLimit);
        }

        let (Some(upstream_url), Some(upstream_ws_url), Some(matcher), true) =
            (upstream_url, upstream_ws_url, matcher, errors.is_empty())
        else {
            return Err(ConfigError::Validation(errors));
        };

        let mut allow: Vec<String> = config.allow.iter().map(|p| p.trim().to_string()).collect();
        allow.sort();
        allow.dedup();

        Ok(Self {
            upstream_url,
            upstream_ws_url,
            allow,
            matcher,
            requests_per_minute: config.rpm,
            exempt,
            min_gas_price: config.min_gas_price,
            max_block_range: config.block_range_limit,
            trust_forwarded_for: config.trust_forwarded_for,
            max_body_bytes: config.max_body_bytes,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            limiter_idle_ttl: Duration::from_secs(config.limiter_idle_ttl_secs),
        })
    }
}

fn check_url(
    field: &'static str,
    value: &str,
    expected: &'static [&'static str],
    errors: &mut Vec<ValidationError>,
) -> Option<Url> {
    let url = match Url::parse(value) {
        Ok(url) => url,
        Err(e) => {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.to_string(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    if !expected.contains(&url.scheme()) {
        errors.push(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        });
        return None;
    }
    if url.host_str().is_none() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: "missing host".to_string(),
        });
        return None;
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let policy = PolicyConfig::from_proxy_config(&ProxyConfig::default()).unwrap();
        assert_eq!(policy.upstream_url.as_str(), "http://127.0.0.1:8040/");
        assert_eq!(policy.upstream_ws_url.scheme(), "ws");
        assert!(policy.matcher.allows_everything());
        assert_eq!(policy.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_collects_all_errors() {
        let config = ProxyConfig {
            url: "not a url".into(),
            ws_url: "http://127.0.0.1:8041".into(),
            allow: vec!["eth_*call".into()],
            no_limit: vec!["localhost".into()],
            ..ProxyConfig::default()
        };
        let Err(ConfigError::Validation(errors)) = PolicyConfig::from_proxy_config(&config) else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::InvalidUrl { field: "url", .. }));
        assert!(matches!(errors[1], ValidationError::UnsupportedScheme { field: "ws url", .. }));
        assert!(matches!(errors[2], ValidationError::InvalidPattern(_)));
        assert_eq!(errors[3], ValidationError::InvalidExemptIp("localhost".into()));
    }

    #[test]
    fn test_tls_upstreams_accepted() {
        let config = ProxyConfig {
            url: "https://node.example/rpc".into(),
            ws_url: "wss://node.example/ws".into(),
            ..ProxyConfig::default()
        };
        let policy = PolicyConfig::from_proxy_config(&config).unwrap();
        assert_eq!(policy.upstream_url.scheme(), "https");
        assert_eq!(policy.upstream_ws_url.scheme(), "wss");
    }

    #[test]
    fn test_foreign_scheme_rejected() {
        let config = ProxyConfig {
            url: "ftp://node.example".into(),
            ws_url: "https://node.example".into(),
            ..ProxyConfig::default()
        };
        let Err(ConfigError::Validation(errors)) = PolicyConfig::from_proxy_config(&config) else {
            panic!("expected validation errors");
        };
        assert!(matches!(errors[0], ValidationError::UnsupportedScheme { field: "url", .. }));
        assert!(matches!(errors[1], ValidationError::UnsupportedScheme { field: "ws url", .. }));
    }

    #[test]
    fn test_exempt_ips_canonicalized() {
        let config = ProxyConfig {
            no_limit: vec![" 127.0.0.1 ".into(), "0:0:0:0:0:0:0:1".into()],
            allow: vec!["net_version".into(), "eth_chainId".into(), "net_version".into()],
            ..ProxyConfig::default()
        };
        let policy = PolicyConfig::from_proxy_config(&config).unwrap();
        assert!(policy.exempt.contains("127.0.0.1"));
        assert!(policy.exempt.contains("::1"));
        assert_eq!(policy.allow, vec!["eth_chainId", "net_version"]);
    }
}
