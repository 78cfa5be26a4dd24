//! Data Models Module
//!
//! This module defines the core data structures used by authcheck to represent
//! raw DNS answers, SPF/DKIM/DMARC verdicts, blacklist probe results and the
//! reputation summary. Every value here is computed fresh per request and never
//! mutated after it has been assembled into a report.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    #[serde(rename = "TXT")]
    Txt,
    #[serde(rename = "A")]
    A,
}

impl RecordType {
    /// Numeric RR type as used on the wire and in DoH JSON answers.
    pub fn code(self) -> u16 {
        match self {
            RecordType::Txt => 16,
            RecordType::A => 1,
        }
    }
}

/// Output of a single DNS query. An empty `values` list means NXDOMAIN or
/// no answer; transport failures are reported separately.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawDnsAnswer {
    pub queried_name: String,
    pub record_type: RecordType,
    pub values: Vec<String>,
}

impl RawDnsAnswer {
    pub fn empty(queried_name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            queried_name: queried_name.into(),
            record_type,
            values: Vec::new(),
        }
    }
}

/// How the lookup behind a verdict ended.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LookupStatus {
    #[default]
    Answered,
    NoRecords,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpfVerdict {
    pub found: bool,
    pub valid: bool,
    pub record: Option<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub lookup_status: LookupStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DkimSelectorVerdict {
    pub selector: String,
    pub found: bool,
    pub valid: bool,
    /// Display form of the record, truncated.
    pub record: Option<String>,
    pub issues: Vec<String>,
    pub lookup_status: LookupStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DkimVerdict {
    pub found: bool,
    pub valid: bool,
    pub selectors: Vec<DkimSelectorVerdict>,
    pub valid_count: usize,
    pub total_checked: usize,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Published DMARC policy. Unknown tokens are kept verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(into = "String", from = "String")]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
    Other(String),
}

impl DmarcPolicy {
    /// Only enforcing policies protect the domain.
    pub fn is_enforcing(&self) -> bool {
        matches!(self, DmarcPolicy::Quarantine | DmarcPolicy::Reject)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DmarcVerdict {
    pub found: bool,
    pub valid: bool,
    pub record: Option<String>,
    pub policy: Option<DmarcPolicy>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub lookup_status: LookupStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pass,
    Warning,
    Fail,
}

impl OverallStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => OverallStatus::Pass,
            50..=79 => OverallStatus::Warning,
            _ => OverallStatus::Fail,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsAuthenticationReport {
    pub spf: SpfVerdict,
    pub dkim: DkimVerdict,
    pub dmarc: DmarcVerdict,
    pub overall_score: u8,
    pub overall_status: OverallStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Ip,
    Domain,
}

/// Outcome of one DNSBL probe: checked and clean, checked and listed, or
/// could not be checked.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Clean,
    Listed,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Interpretation of a DNSBL return code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CodeInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistCheckResult {
    pub provider: String,
    pub zone: String,
    pub check_type: CheckType,
    pub query_name: String,
    pub is_listed: bool,
    pub status: ListingStatus,
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_info: Option<CodeInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Clean,
    Warning,
    Critical,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistSummary {
    pub total_checks: usize,
    pub listed_count: usize,
    pub clean_count: usize,
    pub unknown_count: usize,
    pub status: SummaryStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReputationFactor {
    pub name: String,
    pub status: ListingStatus,
    /// Signed score delta, never positive.
    pub impact: i32,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            50..=69 => Grade::D,
            _ => Grade::F,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DomainReputation {
    pub score: u8,
    pub grade: Grade,
    pub factors: Vec<ReputationFactor>,
}

/// Pointer to one provider, telling the user how to check and get delisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelistingExample {
    pub provider: String,
    pub description: String,
    pub how_to_check: String,
    pub delisting_url: String,
}

/// A normalized verification request. Build it with `VerificationRequest::new`
/// so the domain is normalized and the selector list is de-duplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub domain: String,
    pub dkim_selectors: Vec<String>,
    pub ip: Option<Ipv4Addr>,
    pub check_domain_blacklists: bool,
}

/// Reputation plus the delisting pointer, serialized as one flat object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReputationReport {
    #[serde(flatten)]
    pub reputation: DomainReputation,
    pub example: DelistingExample,
}

/// Response of a blacklist check.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BlacklistReport {
    pub results: Vec<BlacklistCheckResult>,
    pub summary: BlacklistSummary,
    pub reputation: ReputationReport,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub domain: String,
    pub checked_at: DateTime<Utc>,
    pub authentication: DnsAuthenticationReport,
    pub blacklist: Vec<BlacklistCheckResult>,
    pub blacklist_summary: BlacklistSummary,
    pub reputation: ReputationReport,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Txt => write!(f, "TXT"),
            RecordType::A => write!(f, "A"),
        }
    }
}
impl fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmarcPolicy::None => write!(f, "none"),
            DmarcPolicy::Quarantine => write!(f, "quarantine"),
            DmarcPolicy::Reject => write!(f, "reject"),
            DmarcPolicy::Other(raw) => write!(f, "{}", raw),
        }
    }
}
impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Pass => write!(f, "pass"),
            OverallStatus::Warning => write!(f, "warning"),
            OverallStatus::Fail => write!(f, "fail"),
        }
    }
}
impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckType::Ip => write!(f, "ip"),
            CheckType::Domain => write!(f, "domain"),
        }
    }
}
impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingStatus::Clean => write!(f, "clean"),
            ListingStatus::Listed => write!(f, "listed"),
            ListingStatus::Unknown => write!(f, "unknown"),
        }
    }
}
impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryStatus::Clean => write!(f, "clean"),
            SummaryStatus::Warning => write!(f, "warning"),
            SummaryStatus::Critical => write!(f, "critical"),
        }
    }
}
impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{}", letter)
    }
}
impl FromStr for DmarcPolicy {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "none" => DmarcPolicy::None,
            "quarantine" => DmarcPolicy::Quarantine,
            "reject" => DmarcPolicy::Reject,
            _ => DmarcPolicy::Other(s.to_string()),
        })
    }
}
impl From<String> for DmarcPolicy {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(policy) => policy,
            Err(never) => match never {},
        }
    }
}
impl From<DmarcPolicy> for String {
    fn from(policy: DmarcPolicy) -> Self {
        policy.to_string()
    }
}
