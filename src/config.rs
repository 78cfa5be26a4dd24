//! Configuration Module
//!
//! This module reads configuration values from environment variables, provides
//! sensible defaults, and validates the timing parameters that bound a verification
//! request (per-query timeout and overall deadline).

use anyhow::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_DOH_URL: &str = "https://cloudflare-dns.com/dns-query";

/// Tuned scoring constants. These are product judgment calls, kept out of the
/// algorithms so they can be adjusted without touching the parsers or scorers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    /// Maximum number of DNS-lookup-causing SPF mechanisms.
    pub spf_lookup_limit: usize,
    /// Reputation penalty charged per listed IP blacklist provider.
    pub ip_listing_penalty: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            spf_lookup_limit: 10,
            ip_listing_penalty: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub doh_url: String,
    pub dns_timeout: Duration,
    pub deadline: Duration,
    pub bind_addr: String,
    pub webhook_url: Option<String>,
    pub webhook_timeout: u64,
    pub webhook_retries: u32,
    pub scoring: ScoringPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            doh_url: DEFAULT_DOH_URL.to_string(),
            dns_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(12),
            bind_addr: "127.0.0.1:8080".to_string(),
            webhook_url: None,
            webhook_timeout: 30,
            webhook_retries: 3,
            scoring: ScoringPolicy::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or empty, a default value is used.
    pub fn new() -> Result<Self> {
        let defaults = Config::default();

        let doh_url = env::var("AUTHCHECK_DOH_URL")
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.doh_url);

        if !doh_url.starts_with("http://") && !doh_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Resolver URL must be http(s): {}", doh_url));
        }

        let dns_timeout_secs: u64 = env_parse("AUTHCHECK_DNS_TIMEOUT_SECS").unwrap_or(5);
        if dns_timeout_secs == 0 || dns_timeout_secs > 60 {
            return Err(anyhow::anyhow!("DNS timeout must be between 1 and 60 seconds"));
        }

        let deadline_secs: u64 = env_parse("AUTHCHECK_DEADLINE_SECS").unwrap_or(12);
        if deadline_secs < dns_timeout_secs || deadline_secs > 120 {
            return Err(anyhow::anyhow!(
                "Request deadline must be between the DNS timeout ({}s) and 120 seconds",
                dns_timeout_secs
            ));
        }

        let spf_lookup_limit = env_parse("AUTHCHECK_SPF_LOOKUP_LIMIT")
            .unwrap_or(defaults.scoring.spf_lookup_limit);
        let ip_listing_penalty = env_parse("AUTHCHECK_IP_LISTING_PENALTY")
            .unwrap_or(defaults.scoring.ip_listing_penalty);

        let bind_addr = env::var("AUTHCHECK_BIND_ADDR")
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.bind_addr);

        // Trim the webhook URL before checking for emptiness.
        let webhook_url = env::var("AUTHCHECK_WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty());

        let webhook_timeout = env_parse("AUTHCHECK_WEBHOOK_TIMEOUT_SECS").unwrap_or(30);
        let webhook_retries = env_parse("AUTHCHECK_WEBHOOK_RETRIES").unwrap_or(3);

        Ok(Config {
            doh_url,
            dns_timeout: Duration::from_secs(dns_timeout_secs),
            deadline: Duration::from_secs(deadline_secs),
            bind_addr,
            webhook_url,
            webhook_timeout,
            webhook_retries,
            scoring: ScoringPolicy {
                spf_lookup_limit,
                ip_listing_penalty,
            },
        })
    }
}
