//! DNS Resolver Module
//!
//! A thin layer over DNS-over-HTTPS (the JSON flavour served by Cloudflare, Google and
//! most RFC 8484 endpoints). Lookups never fail on NXDOMAIN or an empty answer; those
//! come back as an answer with zero values. Transport problems (HTTP errors, timeouts,
//! SERVFAIL) are errors, and [`DnsClient`] folds them into a [`LookupOutcome`] so the
//! record analysis can treat every lookup uniformly.

use crate::error::{AuthCheckError, Result};
use crate::models::{LookupStatus, RawDnsAnswer, RecordType};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Anything that can answer TXT and A queries.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn query(&self, name: &str, record_type: RecordType) -> Result<RawDnsAnswer>;
}

const DNS_NOERROR: u32 = 0;
const DNS_NXDOMAIN: u32 = 3;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    #[serde(default)]
    data: String,
}

/// DNS-over-HTTPS resolver using the `application/dns-json` API.
#[derive(Debug, Clone)]
pub struct DohResolver {
    client: Client,
    endpoint: Url,
}

impl DohResolver {
    /// Creates a resolver for the given endpoint, e.g. `https://cloudflare-dns.com/dns-query`.
    pub fn new(endpoint: impl AsRef<str>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint.as_ref()).context("Invalid resolver URL")?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn query(&self, name: &str, record_type: RecordType) -> Result<RawDnsAnswer> {
        debug!("DoH {} lookup for {}", record_type, name);
        let type_param = record_type.to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("name", name), ("type", type_param.as_str())])
            .header(ACCEPT, "application/dns-json")
            .send()
            .await
            .map_err(|e| transport_error(name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthCheckError::DnsTransport {
                name: name.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(name, e))?;
        let body: DohResponse = serde_json::from_slice(&bytes)?;
        if body.status != DNS_NOERROR && body.status != DNS_NXDOMAIN {
            return Err(AuthCheckError::ResolverStatus {
                name: name.to_string(),
                status: body.status,
            });
        }

        let values = body
            .answer
            .into_iter()
            .filter(|a| a.record_type == record_type.code())
            .map(|a| match record_type {
                RecordType::Txt => decode_txt_data(&a.data),
                RecordType::A => a.data.trim().to_string(),
            })
            .collect::<Vec<_>>();

        debug!("DoH found {} {} values for {}", values.len(), record_type, name);
        Ok(RawDnsAnswer {
            queried_name: name.to_string(),
            record_type,
            values,
        })
    }
}

fn transport_error(name: &str, e: reqwest::Error) -> AuthCheckError {
    if e.is_timeout() {
        AuthCheckError::Timeout {
            name: name.to_string(),
        }
    } else {
        AuthCheckError::Http(e)
    }
}

/// Decodes TXT presentation data. A sequence of quoted character-strings is
/// concatenated, `\"`, `\\` and `\DDD` escapes are resolved. Unquoted data is
/// returned trimmed.
pub fn decode_txt_data(data: &str) -> String {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return trimmed.to_string();
    }

    let mut out: Vec<u8> = Vec::with_capacity(trimmed.len());
    let mut in_quotes = false;
    let mut chars = trimmed.chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => {
                let mut digits = String::new();
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if digits.is_empty() {
                    if let Some(next) = chars.next() {
                        out.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
                    }
                } else if let (3, Ok(byte)) = (digits.len(), digits.parse::<u8>()) {
                    out.push(byte);
                } else {
                    out.extend_from_slice(digits.as_bytes());
                }
            }
            c if in_quotes => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            _ => {}
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Result of one bounded lookup: an answer (possibly empty) or a failure.
#[derive(Debug)]
pub enum LookupOutcome {
    Answer(RawDnsAnswer),
    Failed(AuthCheckError),
}

impl LookupOutcome {
    pub fn values(&self) -> &[String] {
        match self {
            LookupOutcome::Answer(answer) => &answer.values,
            LookupOutcome::Failed(_) => &[],
        }
    }

    pub fn status(&self) -> LookupStatus {
        match self {
            LookupOutcome::Answer(answer) if answer.values.is_empty() => LookupStatus::NoRecords,
            LookupOutcome::Answer(_) => LookupStatus::Answered,
            LookupOutcome::Failed(_) => LookupStatus::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LookupOutcome::Failed(_))
    }
}

/// Resolver handle shared by every branch of a request. Each lookup is bounded
/// by the per-query timeout and by the request deadline, whichever comes first.
#[derive(Clone)]
pub struct DnsClient {
    resolver: Arc<dyn DnsResolver>,
    timeout: Duration,
}

impl DnsClient {
    pub fn new(resolver: Arc<dyn DnsResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    pub async fn lookup(&self, name: &str, record_type: RecordType, deadline: Instant) -> LookupOutcome {
        let bound = std::cmp::min(Instant::now() + self.timeout, deadline);
        match tokio::time::timeout_at(bound, self.resolver.query(name, record_type)).await {
            Ok(Ok(answer)) => LookupOutcome::Answer(answer),
            Ok(Err(e)) => {
                warn!("{} lookup for {} failed: {}", record_type, name, e);
                LookupOutcome::Failed(e)
            }
            Err(_) => {
                warn!("{} lookup for {} timed out", record_type, name);
                LookupOutcome::Failed(AuthCheckError::Timeout {
                    name: name.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Canned resolver for unit tests.
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Values(Vec<String>),
        Fail,
        Delayed(Duration, Vec<String>),
    }

    /// Names without a configured reply resolve to an empty answer.
    #[derive(Default)]
    pub struct MockResolver {
        replies: HashMap<(String, RecordType), Reply>,
        calls: AtomicUsize,
    }

    impl MockResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn txt(mut self, name: &str, values: &[&str]) -> Self {
            self.replies.insert(
                (name.to_string(), RecordType::Txt),
                Reply::Values(values.iter().map(|v| v.to_string()).collect()),
            );
            self
        }

        pub fn a(mut self, name: &str, values: &[&str]) -> Self {
            self.replies.insert(
                (name.to_string(), RecordType::A),
                Reply::Values(values.iter().map(|v| v.to_string()).collect()),
            );
            self
        }

        pub fn fail(mut self, name: &str, record_type: RecordType) -> Self {
            self.replies.insert((name.to_string(), record_type), Reply::Fail);
            self
        }

        pub fn delayed(mut self, name: &str, record_type: RecordType, delay: Duration, values: &[&str]) -> Self {
            self.replies.insert(
                (name.to_string(), record_type),
                Reply::Delayed(delay, values.iter().map(|v| v.to_string()).collect()),
            );
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DnsResolver for MockResolver {
        async fn query(&self, name: &str, record_type: RecordType) -> Result<RawDnsAnswer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let values = match self.replies.get(&(name.to_string(), record_type)) {
                None => Vec::new(),
                Some(Reply::Values(values)) => values.clone(),
                Some(Reply::Fail) => {
                    return Err(AuthCheckError::DnsTransport {
                        name: name.to_string(),
                        reason: "connection refused".to_string(),
                    })
                }
                Some(Reply::Delayed(delay, values)) => {
                    tokio::time::sleep(*delay).await;
                    values.clone()
                }
            };
            Ok(RawDnsAnswer {
                queried_name: name.to_string(),
                record_type,
                values,
            })
        }
    }
}
