//! Blacklist Probe Module
//!
//! Checks an IPv4 address and/or a domain against a fixed table of DNS blocklists.
//! IP lookups query `{reversed-ip}.{zone}`, domain lookups query `{domain}.{zone}`,
//! both as type A. Any A answer means listed, except the operators' documented
//! "query refused" codes, which mean the provider could not be checked. All
//! providers are probed concurrently; one failing provider never aborts the others.

use crate::models::{
    BlacklistCheckResult, BlacklistSummary, CheckType, CodeInfo, ListingStatus, RecordType, Severity,
    SummaryStatus,
};
use crate::resolver::{DnsClient, LookupOutcome};
use futures_util::future::join_all;
use std::net::Ipv4Addr;
use tokio::time::Instant;
use tracing::{debug, info};

/// Return-code dialect spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFamily {
    Spamhaus,
    Uribl,
    Surbl,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlacklistProvider {
    pub name: &'static str,
    pub zone: &'static str,
    pub check_type: CheckType,
    /// Contribution to reputation scoring. For IP lists this is informational;
    /// the IP factor applies the configured per-listing penalty instead.
    pub weight: u32,
    pub family: CodeFamily,
    pub about: &'static str,
    pub delisting_url: &'static str,
}

pub static PROVIDERS: &[BlacklistProvider] = &[
    BlacklistProvider {
        name: "Spamhaus SBL",
        zone: "sbl.spamhaus.org",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Spamhaus,
        about: "Spamhaus Block List of verified spam sources and spam operations",
        delisting_url: "https://check.spamhaus.org/",
    },
    BlacklistProvider {
        name: "Spamhaus XBL",
        zone: "xbl.spamhaus.org",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Spamhaus,
        about: "Spamhaus Exploits Block List of hijacked and infected hosts",
        delisting_url: "https://check.spamhaus.org/",
    },
    BlacklistProvider {
        name: "Spamhaus PBL",
        zone: "pbl.spamhaus.org",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Spamhaus,
        about: "Spamhaus Policy Block List of end-user ranges that should not send mail directly",
        delisting_url: "https://check.spamhaus.org/",
    },
    BlacklistProvider {
        name: "Spamhaus DBL",
        zone: "dbl.spamhaus.org",
        check_type: CheckType::Domain,
        weight: 25,
        family: CodeFamily::Spamhaus,
        about: "Spamhaus Domain Block List of domains found in spam, phishing and malware",
        delisting_url: "https://check.spamhaus.org/",
    },
    BlacklistProvider {
        name: "Barracuda",
        zone: "b.barracudacentral.org",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Generic,
        about: "Barracuda Reputation Block List of IPs sending spam",
        delisting_url: "https://www.barracudacentral.org/rbl/removal-request",
    },
    BlacklistProvider {
        name: "SpamCop",
        zone: "bl.spamcop.net",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Generic,
        about: "SpamCop Blocking List built from user spam reports",
        delisting_url: "https://www.spamcop.net/bl.shtml",
    },
    BlacklistProvider {
        name: "SORBS",
        zone: "dnsbl.sorbs.net",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Generic,
        about: "SORBS aggregate list of spam sources, open relays and proxies",
        delisting_url: "http://www.sorbs.net/delisting/",
    },
    BlacklistProvider {
        name: "UCEPROTECT L1",
        zone: "dnsbl-1.uceprotect.net",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Generic,
        about: "UCEPROTECT level 1 list of single IPs caught sending spam",
        delisting_url: "https://www.uceprotect.net/en/rblcheck.php",
    },
    BlacklistProvider {
        name: "UCEPROTECT L2",
        zone: "dnsbl-2.uceprotect.net",
        check_type: CheckType::Ip,
        weight: 5,
        family: CodeFamily::Generic,
        about: "UCEPROTECT level 2 list of allocations with repeated abuse",
        delisting_url: "https://www.uceprotect.net/en/rblcheck.php",
    },
    BlacklistProvider {
        name: "Invaluement",
        zone: "invaluement.com",
        check_type: CheckType::Domain,
        weight: 10,
        family: CodeFamily::Generic,
        about: "Invaluement URI list of domains used by snowshoe and hard-to-catch spam",
        delisting_url: "https://www.invaluement.com/removal/",
    },
    BlacklistProvider {
        name: "SURBL",
        zone: "multi.surbl.org",
        check_type: CheckType::Domain,
        weight: 20,
        family: CodeFamily::Surbl,
        about: "SURBL list of domains appearing in unsolicited messages",
        delisting_url: "https://www.surbl.org/surbl-analysis",
    },
    BlacklistProvider {
        name: "URIBL",
        zone: "multi.uribl.com",
        check_type: CheckType::Domain,
        weight: 15,
        family: CodeFamily::Uribl,
        about: "URIBL list of domains found in the body of spam",
        delisting_url: "https://admin.uribl.com/",
    },
];

/// `codeInfo.type` of a provider whose lookup failed.
pub const LOOKUP_FAILED: &str = "lookup-failed";

pub fn find_provider(name: &str) -> Option<&'static BlacklistProvider> {
    PROVIDERS.iter().find(|p| p.name == name)
}

/// Converts `1.2.3.4` into `4.3.2.1`.
pub fn reverse_ipv4(ip: &Ipv4Addr) -> String {
    let octets = ip.octets();
    format!("{}.{}.{}.{}", octets[3], octets[2], octets[1], octets[0])
}

pub fn query_name(provider: &BlacklistProvider, ip: Option<&Ipv4Addr>, domain: Option<&str>) -> Option<String> {
    match provider.check_type {
        CheckType::Ip => ip.map(|ip| format!("{}.{}", reverse_ipv4(ip), provider.zone)),
        CheckType::Domain => domain.map(|d| format!("{}.{}", d, provider.zone)),
    }
}

/// Every (provider, query name) pair applicable to the given targets.
pub fn plan_queries(ip: Option<&Ipv4Addr>, domain: Option<&str>) -> Vec<(&'static BlacklistProvider, String)> {
    PROVIDERS
        .iter()
        .filter_map(|p| query_name(p, ip, domain).map(|name| (p, name)))
        .collect()
}

fn code_info(kind: &str, severity: Severity, description: impl Into<String>) -> CodeInfo {
    CodeInfo {
        kind: kind.to_string(),
        severity,
        description: description.into(),
    }
}

/// Interprets one A answer from a DNSBL zone.
pub fn interpret_return_code(provider: &BlacklistProvider, answer: &str) -> (ListingStatus, CodeInfo) {
    let Ok(addr) = answer.trim().parse::<Ipv4Addr>() else {
        return (
            ListingStatus::Listed,
            code_info("listed", Severity::Medium, format!("Listed by {} (answer: {})", provider.name, answer)),
        );
    };
    let [a, b, c, d] = addr.octets();

    if (a, b, c) == (127, 255, 255) {
        let description = match d {
            252 => "Query refused: malformed DNSBL query name",
            254 => "Query refused: lookups through public resolvers are blocked",
            255 => "Query refused: excessive number of queries",
            _ => "Query refused by the DNSBL operator",
        };
        return (ListingStatus::Unknown, code_info("query-refused", Severity::Info, description));
    }
    if a != 127 {
        return (
            ListingStatus::Listed,
            code_info("listed", Severity::Low, format!("Unexpected answer {} from {}", addr, provider.zone)),
        );
    }

    match provider.family {
        CodeFamily::Spamhaus => spamhaus_code(c, d),
        CodeFamily::Uribl => uribl_code(d),
        CodeFamily::Surbl => surbl_code(d),
        CodeFamily::Generic => (
            ListingStatus::Listed,
            code_info("listed", Severity::Medium, format!("Listed by {}", provider.name)),
        ),
    }
}

fn spamhaus_code(c: u8, d: u8) -> (ListingStatus, CodeInfo) {
    let info = match (c, d) {
        (0, 2) => code_info("sbl", Severity::High, "Direct spam source or spam operation"),
        (0, 3) => code_info("css", Severity::Medium, "Snowshoe spam or low-reputation sender"),
        (0, 4..=7) => code_info("xbl", Severity::Critical, "Exploited host, botnet or open proxy"),
        (0, 9) => code_info("drop", Severity::Critical, "Hijacked netblock (DROP list)"),
        (0, 10) | (0, 11) => code_info("pbl", Severity::Low, "Dynamic or end-user range that should not send mail directly"),
        (1, 2) => code_info("spam-domain", Severity::High, "Domain used in spam"),
        (1, 4) => code_info("phish-domain", Severity::Critical, "Domain used for phishing"),
        (1, 5) => code_info("malware-domain", Severity::Critical, "Domain used to distribute malware"),
        (1, 6) => code_info("botnet-domain", Severity::Critical, "Domain used for botnet command and control"),
        (1, 102) => code_info("abused-legit", Severity::Medium, "Abused legitimate domain seen in spam"),
        (1, 103) => code_info("abused-redirector", Severity::Medium, "Abused URL redirector or shortener"),
        (1, 104) => code_info("abused-phish", Severity::High, "Abused legitimate domain hosting phishing"),
        (1, 105) => code_info("abused-malware", Severity::High, "Abused legitimate domain hosting malware"),
        (1, 106) => code_info("abused-botnet", Severity::High, "Abused legitimate domain used by a botnet"),
        _ => code_info("listed", Severity::Medium, format!("Listed (code 127.0.{}.{})", c, d)),
    };
    (ListingStatus::Listed, info)
}

fn uribl_code(d: u8) -> (ListingStatus, CodeInfo) {
    if d == 1 {
        return (
            ListingStatus::Unknown,
            code_info("query-refused", Severity::Info, "Query refused: resolver is blocked by URIBL"),
        );
    }
    let mut lists = Vec::new();
    if d & 2 != 0 {
        lists.push("black");
    }
    if d & 4 != 0 {
        lists.push("grey");
    }
    if d & 8 != 0 {
        lists.push("red");
    }
    let severity = if d & 2 != 0 { Severity::High } else { Severity::Medium };
    let description = if lists.is_empty() {
        format!("Listed (code 127.0.0.{})", d)
    } else {
        format!("Listed on URIBL {}", lists.join(", "))
    };
    (ListingStatus::Listed, code_info("uribl", severity, description))
}

fn surbl_code(d: u8) -> (ListingStatus, CodeInfo) {
    if d == 1 {
        return (
            ListingStatus::Unknown,
            code_info("query-refused", Severity::Info, "Query refused: resolver is blocked by SURBL"),
        );
    }
    let mut lists = Vec::new();
    if d & 8 != 0 {
        lists.push("phishing");
    }
    if d & 16 != 0 {
        lists.push("malware");
    }
    if d & 64 != 0 {
        lists.push("spam/abuse");
    }
    if d & 128 != 0 {
        lists.push("cracked site");
    }
    let severity = if d & (8 | 16) != 0 { Severity::Critical } else { Severity::High };
    let description = if lists.is_empty() {
        format!("Listed (code 127.0.0.{})", d)
    } else {
        format!("Listed for {}", lists.join(", "))
    };
    (ListingStatus::Listed, code_info("surbl", severity, description))
}

/// Builds one provider's result from its bounded lookup.
pub fn result_from_lookup(provider: &BlacklistProvider, query_name: String, outcome: &LookupOutcome) -> BlacklistCheckResult {
    let (status, return_code, info) = match outcome {
        LookupOutcome::Failed(e) => (
            ListingStatus::Unknown,
            None,
            Some(code_info(LOOKUP_FAILED, Severity::Info, format!("Could not check: {}", e))),
        ),
        LookupOutcome::Answer(answer) if answer.values.is_empty() => (ListingStatus::Clean, None, None),
        LookupOutcome::Answer(answer) => {
            let interpreted: Vec<(&String, (ListingStatus, CodeInfo))> = answer
                .values
                .iter()
                .map(|v| (v, interpret_return_code(provider, v)))
                .collect();
            // A listing code wins over refusal codes; among listings the most severe wins.
            let chosen = interpreted
                .iter()
                .filter(|(_, (status, _))| *status == ListingStatus::Listed)
                .max_by_key(|(_, (_, info))| info.severity)
                .or_else(|| interpreted.first());
            match chosen {
                Some((value, (status, info))) => (*status, Some(value.to_string()), Some(info.clone())),
                None => (ListingStatus::Clean, None, None),
            }
        }
    };

    match status {
        ListingStatus::Listed => info!("{}: LISTED ({})", provider.name, query_name),
        ListingStatus::Unknown => info!("{}: UNKNOWN ({})", provider.name, query_name),
        ListingStatus::Clean => debug!("{}: clean ({})", provider.name, query_name),
    }

    BlacklistCheckResult {
        provider: provider.name.to_string(),
        zone: provider.zone.to_string(),
        check_type: provider.check_type,
        query_name,
        is_listed: status == ListingStatus::Listed,
        status,
        weight: provider.weight,
        return_code,
        code_info: info,
    }
}

/// Probes every applicable provider concurrently. `domain` must already be in
/// blacklist form (see [`crate::domain::blacklist_domain`]).
pub async fn probe(
    client: &DnsClient,
    ip: Option<&Ipv4Addr>,
    domain: Option<&str>,
    deadline: Instant,
) -> Vec<BlacklistCheckResult> {
    let checks = plan_queries(ip, domain).into_iter().map(|(provider, name)| async move {
        let outcome = client.lookup(&name, RecordType::A, deadline).await;
        result_from_lookup(provider, name, &outcome)
    });
    join_all(checks).await
}

/// True when the provider could not be queried at all.
pub fn lookup_failed(result: &BlacklistCheckResult) -> bool {
    result.code_info.as_ref().is_some_and(|info| info.kind == LOOKUP_FAILED)
}

pub fn summarize(results: &[BlacklistCheckResult]) -> BlacklistSummary {
    let listed_count = results.iter().filter(|r| r.status == ListingStatus::Listed).count();
    let unknown_count = results.iter().filter(|r| r.status == ListingStatus::Unknown).count();
    let status = match listed_count {
        0 => SummaryStatus::Clean,
        1 | 2 => SummaryStatus::Warning,
        _ => SummaryStatus::Critical,
    };
    BlacklistSummary {
        total_checks: results.len(),
        listed_count,
        clean_count: results.len() - listed_count - unknown_count,
        unknown_count,
        status,
    }
}
