//! DKIM Analysis Module
//!
//! Validates DKIM key records published at `{selector}._domainkey.{domain}`. Several
//! selectors can be checked in one pass; they are queried concurrently and the
//! per-selector verdicts are folded into a single aggregate, in request order.

use crate::models::{DkimSelectorVerdict, DkimVerdict, LookupStatus, RecordType};
use crate::resolver::{DnsClient, LookupOutcome};
use crate::tags::{find_tag, parse_tags};
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::debug;

const DISPLAY_LIMIT: usize = 100;

pub fn selector_name(selector: &str, domain: &str) -> String {
    format!("{}._domainkey.{}", selector, domain)
}

/// Analyzes the TXT values found for one selector. Pure and total.
pub fn analyze_selector(selector: &str, records: &[String]) -> DkimSelectorVerdict {
    let Some(record) = records
        .iter()
        .find(|r| r.contains("v=DKIM1"))
        .or_else(|| records.first())
    else {
        return DkimSelectorVerdict {
            selector: selector.to_string(),
            found: false,
            valid: false,
            record: None,
            issues: vec![format!("No DKIM record found for selector \"{}\"", selector)],
            lookup_status: LookupStatus::NoRecords,
        };
    };

    let tags = parse_tags(record);
    let mut issues = Vec::new();

    if find_tag(&tags, "v") != Some("DKIM1") {
        issues.push("Missing version tag (v=DKIM1)".to_string());
    }

    match find_tag(&tags, "p") {
        None => issues.push("Missing public key (p=)".to_string()),
        Some(key) if key.trim().is_empty() => {
            issues.push("Public key is empty (record may be revoked)".to_string())
        }
        Some(_) => {}
    }

    DkimSelectorVerdict {
        selector: selector.to_string(),
        found: true,
        valid: issues.is_empty(),
        record: Some(truncate_for_display(record)),
        issues,
        lookup_status: LookupStatus::Answered,
    }
}

fn truncate_for_display(record: &str) -> String {
    match record.char_indices().nth(DISPLAY_LIMIT) {
        Some((cut, _)) => format!("{}...", &record[..cut]),
        None => record.to_string(),
    }
}

pub fn selector_from_lookup(selector: &str, outcome: &LookupOutcome) -> DkimSelectorVerdict {
    let mut verdict = analyze_selector(selector, outcome.values());
    verdict.lookup_status = outcome.status();
    if let LookupOutcome::Failed(e) = outcome {
        verdict.issues = vec![format!(
            "DKIM lookup for selector \"{}\" could not be completed: {}",
            selector, e
        )];
    }
    verdict
}

/// Folds per-selector verdicts into the aggregate. Order is preserved.
pub fn aggregate(selectors: Vec<DkimSelectorVerdict>) -> DkimVerdict {
    let found_count = selectors.iter().filter(|s| s.found).count();
    let valid_count = selectors.iter().filter(|s| s.valid).count();

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if found_count == 0 {
        issues.push("No DKIM records found for any of the specified selectors".to_string());
        recommendations.push("Configure DKIM signing with your email provider".to_string());
        recommendations.push(
            "Verify you're using the correct DKIM selectors for your email services".to_string(),
        );
    } else if valid_count == 0 {
        issues.push("DKIM records found but none are valid".to_string());
        recommendations.push("Check and fix the issues with your DKIM records".to_string());
    } else if valid_count < found_count {
        issues.push(format!(
            "{} DKIM selector(s) have issues",
            found_count - valid_count
        ));
        recommendations.push("Review and fix invalid DKIM records".to_string());
    }

    for selector in selectors.iter().filter(|s| s.found && !s.valid && !s.issues.is_empty()) {
        issues.push(format!("{}: {}", selector.selector, selector.issues.join(", ")));
    }

    DkimVerdict {
        found: found_count > 0,
        valid: valid_count > 0,
        valid_count,
        total_checked: selectors.len(),
        selectors,
        issues,
        recommendations,
    }
}

/// Queries every selector concurrently and aggregates the verdicts.
pub async fn check_dkim(client: &DnsClient, domain: &str, selectors: &[String], deadline: Instant) -> DkimVerdict {
    let lookups = selectors.iter().map(|selector| async move {
        let name = selector_name(selector, domain);
        let outcome = client.lookup(&name, RecordType::Txt, deadline).await;
        selector_from_lookup(selector, &outcome)
    });
    // join_all keeps results index-aligned with the requested selectors.
    let verdicts = join_all(lookups).await;
    let verdict = aggregate(verdicts);
    debug!(
        "DKIM for {}: {}/{} selectors valid",
        domain, verdict.valid_count, verdict.total_checked
    );
    verdict
}
