//! DMARC Analysis Module
//!
//! Judges the policy published at `_dmarc.{domain}`. A record is only considered
//! valid when it enforces (`quarantine` or `reject`); `p=none` is monitoring only
//! and never counts as protection.

use crate::models::{DmarcPolicy, DmarcVerdict, LookupStatus};
use crate::resolver::LookupOutcome;
use crate::tags::{find_tag, parse_tags};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anchored on a tag boundary so `sp=` is never read as the domain policy.
    static ref POLICY_TAG: Regex = Regex::new(r"(?:^|;)\s*[pP]\s*=\s*(\w+)").unwrap();
}

pub fn dmarc_name(domain: &str) -> String {
    format!("_dmarc.{}", domain)
}

fn extract_policy(record: &str) -> Option<DmarcPolicy> {
    POLICY_TAG
        .captures(record)
        .and_then(|c| c.get(1))
        .map(|m| DmarcPolicy::from(m.as_str().to_string()))
}

/// Analyzes the TXT values at `_dmarc.{domain}`. Pure and total.
pub fn analyze_dmarc(records: &[String]) -> DmarcVerdict {
    let dmarc_records: Vec<&String> = records.iter().filter(|r| r.starts_with("v=DMARC1")).collect();

    let Some(record) = dmarc_records.first() else {
        return DmarcVerdict {
            found: false,
            valid: false,
            record: None,
            policy: None,
            issues: vec!["No DMARC record found".to_string()],
            recommendations: vec![
                "Add a DMARC record to protect your domain from spoofing".to_string(),
                "Start with: v=DMARC1; p=none; rua=mailto:dmarc@yourdomain.com".to_string(),
            ],
            lookup_status: LookupStatus::Answered,
        };
    };

    let tags = parse_tags(record);
    let policy = extract_policy(record);
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if dmarc_records.len() > 1 {
        issues.push(format!(
            "Multiple DMARC records found ({}) - receivers may ignore all of them",
            dmarc_records.len()
        ));
        recommendations.push("Keep a single DMARC record at _dmarc".to_string());
    }

    match &policy {
        None => {
            issues.push("DMARC record missing policy (p=)".to_string());
            recommendations.push("Add a policy: p=none, p=quarantine, or p=reject".to_string());
        }
        Some(DmarcPolicy::None) => {
            issues.push("DMARC policy is set to 'none' (monitoring only)".to_string());
            recommendations.push(
                "Consider upgrading to p=quarantine or p=reject for better protection".to_string(),
            );
        }
        Some(DmarcPolicy::Other(raw)) => {
            issues.push(format!("DMARC policy '{}' is not recognized", raw));
            recommendations.push("Use p=none, p=quarantine, or p=reject".to_string());
        }
        Some(_) => {}
    }

    let rua = find_tag(&tags, "rua").map(str::trim).filter(|v| !v.is_empty());
    if rua.is_none() {
        issues.push("No aggregate reporting email configured".to_string());
        recommendations.push("Add rua= to receive DMARC reports".to_string());
    }

    if policy == Some(DmarcPolicy::Reject) && find_tag(&tags, "sp").is_none() {
        recommendations.push("Consider adding sp= for subdomain policy".to_string());
    }

    DmarcVerdict {
        found: true,
        valid: policy.as_ref().is_some_and(DmarcPolicy::is_enforcing),
        record: Some(record.to_string()),
        policy,
        issues,
        recommendations,
        lookup_status: LookupStatus::Answered,
    }
}

pub fn dmarc_from_lookup(outcome: &LookupOutcome) -> DmarcVerdict {
    let mut verdict = analyze_dmarc(outcome.values());
    verdict.lookup_status = outcome.status();
    if let LookupOutcome::Failed(e) = outcome {
        verdict
            .issues
            .insert(0, format!("DMARC lookup could not be completed: {}", e));
    }
    verdict
}
