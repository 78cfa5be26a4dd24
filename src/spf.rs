//! SPF Analysis Module
//!
//! Judges the SPF policy published in the TXT records of a bare domain. Exactly
//! one `v=spf1` record is expected; several are flagged and never merged.

use crate::models::{LookupStatus, SpfVerdict};
use crate::resolver::LookupOutcome;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Terms that cost a DNS lookup when the policy is evaluated.
    static ref LOOKUP_TERMS: Regex = Regex::new(r"include:|a:|mx:|ptr:|redirect=").unwrap();
}

/// Analyzes all TXT values of a domain. Pure and total.
pub fn analyze_spf(records: &[String], lookup_limit: usize) -> SpfVerdict {
    let spf_records: Vec<&String> = records.iter().filter(|r| r.starts_with("v=spf1")).collect();

    if spf_records.is_empty() {
        return SpfVerdict {
            found: false,
            valid: false,
            record: None,
            issues: vec!["No SPF record found".to_string()],
            recommendations: vec![
                "Add an SPF record to authorize your mail servers".to_string(),
                "Example: v=spf1 include:_spf.google.com ~all".to_string(),
            ],
            lookup_status: LookupStatus::Answered,
        };
    }

    if spf_records.len() > 1 {
        return SpfVerdict {
            found: true,
            valid: false,
            record: Some(spf_records[0].clone()),
            issues: vec![format!(
                "Multiple SPF records found ({}) - only one is allowed",
                spf_records.len()
            )],
            recommendations: vec!["Merge all SPF records into a single record".to_string()],
            lookup_status: LookupStatus::Answered,
        };
    }

    let spf = spf_records[0];
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if !spf.contains("~all") && !spf.contains("-all") && !spf.contains("?all") {
        issues.push("SPF record missing 'all' mechanism".to_string());
        recommendations.push("Add ~all or -all at the end of your SPF record".to_string());
    }

    if spf.contains("+all") {
        issues.push("SPF uses +all which allows any server to send mail".to_string());
        recommendations.push("Change +all to ~all or -all for better security".to_string());
    }

    let lookups = count_lookup_terms(spf);
    if lookups > lookup_limit {
        issues.push(format!(
            "SPF exceeds {} DNS lookup limit (found {})",
            lookup_limit, lookups
        ));
        recommendations.push("Flatten your SPF record or reduce includes".to_string());
    }

    SpfVerdict {
        found: true,
        valid: issues.is_empty(),
        record: Some(spf.clone()),
        issues,
        recommendations,
        lookup_status: LookupStatus::Answered,
    }
}

pub fn count_lookup_terms(record: &str) -> usize {
    LOOKUP_TERMS.find_iter(record).count()
}

/// Builds the verdict from a bounded lookup of the bare domain.
pub fn spf_from_lookup(outcome: &LookupOutcome, lookup_limit: usize) -> SpfVerdict {
    let mut verdict = analyze_spf(outcome.values(), lookup_limit);
    verdict.lookup_status = outcome.status();
    if let LookupOutcome::Failed(e) = outcome {
        verdict
            .issues
            .insert(0, format!("SPF lookup could not be completed: {}", e));
    }
    verdict
}
