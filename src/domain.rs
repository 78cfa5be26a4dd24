//! Input Normalization Module
//!
//! Everything that arrives from a caller passes through here before any lookup:
//! domains lose their scheme, path and case; selector lists arrive as a loosely
//! typed comma-joined string and leave as an ordered, de-duplicated list.

use crate::error::{AuthCheckError, Result};
use crate::models::VerificationRequest;
use std::net::Ipv4Addr;

pub const DEFAULT_DKIM_SELECTOR: &str = "google";
const MAX_DOMAIN_LENGTH: usize = 253;

/// Normalizes a user-supplied domain: strips `http://`/`https://`, anything
/// from the first `/`, `?` or `#`, a trailing root dot, and lowercases.
pub fn normalize_domain(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');

    if host.is_empty() {
        return Err(AuthCheckError::InvalidInput("Domain is required".to_string()));
    }
    if host.len() > MAX_DOMAIN_LENGTH {
        return Err(AuthCheckError::InvalidInput(format!(
            "Domain name too long (max {} characters)",
            MAX_DOMAIN_LENGTH
        )));
    }
    if host.chars().any(|c| c.is_whitespace()) || host.starts_with('.') || host.contains("..") {
        return Err(AuthCheckError::InvalidInput(format!("Invalid domain: {}", trimmed)));
    }
    Ok(host.to_string())
}

/// Domain form used for DNSBL queries: normalized, without a leading `www.`.
pub fn blacklist_domain(input: &str) -> Result<String> {
    let domain = normalize_domain(input)?;
    match domain.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => Ok(rest.to_string()),
        _ => Ok(domain),
    }
}

/// Splits a comma-separated selector string into trimmed, non-empty,
/// de-duplicated selectors, preserving first-seen order.
pub fn parse_selectors(raw: &str) -> Vec<String> {
    normalize_selectors(raw.split(','))
}

pub fn normalize_selectors<I, S>(selectors: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for selector in selectors {
        let selector = selector.as_ref().trim();
        if !selector.is_empty() && !out.iter().any(|s| s == selector) {
            out.push(selector.to_string());
        }
    }
    if out.is_empty() {
        out.push(DEFAULT_DKIM_SELECTOR.to_string());
    }
    out
}

/// Parses an optional dotted-quad IPv4 address; blank input counts as absent.
pub fn parse_ip(input: Option<&str>) -> Result<Option<Ipv4Addr>> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<Ipv4Addr>()
            .map(Some)
            .map_err(|_| AuthCheckError::InvalidInput(format!("Invalid IPv4 address: {}", raw))),
    }
}

impl VerificationRequest {
    /// Builds a request from loosely typed caller input.
    pub fn new(domain: &str, selectors: &str, ip: Option<&str>) -> Result<Self> {
        Ok(Self {
            domain: normalize_domain(domain)?,
            dkim_selectors: parse_selectors(selectors),
            ip: parse_ip(ip)?,
            check_domain_blacklists: true,
        })
    }

    pub fn with_domain_blacklists(mut self, enabled: bool) -> Self {
        self.check_domain_blacklists = enabled;
        self
    }
}
