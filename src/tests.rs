//! Cross-module properties of the verification pipeline.
//!
//! These run the parsers, scorers and orchestrator together against the
//! in-crate mock resolver.

use crate::config::{Config, ScoringPolicy};
use crate::dkim::{aggregate, analyze_selector};
use crate::dmarc::analyze_dmarc;
use crate::models::{ListingStatus, OverallStatus, VerificationRequest};
use crate::reputation::score_reputation;
use crate::resolver::mock::MockResolver;
use crate::scoring::build_report;
use crate::spf::analyze_spf;
use crate::verify::Verifier;
use std::sync::Arc;

fn records(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_hard_fail_spf_contributes_thirty_points() {
    for record in ["v=spf1 -all", "v=spf1 ip4:192.0.2.0/24 include:_spf.example.net -all"] {
        let spf = analyze_spf(&records(&[record]), ScoringPolicy::default().spf_lookup_limit);
        assert!(spf.valid, "{}", record);
        let report = build_report(spf, aggregate(vec![analyze_selector("s", &[])]), analyze_dmarc(&[]));
        assert_eq!(report.overall_score, 30);
    }
}

#[test]
fn test_parsers_never_panic_on_garbage() {
    let inputs = [
        "",
        ";;;;",
        "v=spf1",
        "v=DKIM1; p",
        "v=DMARC1; p=; sp=; rua",
        "=====",
        "v=DMARC1;p=reject;;;;=x",
        "\u{0}\u{7f}ü€",
        "v=spf1 include: a: mx: ptr: redirect=",
    ];
    for input in inputs {
        let input = records(&[input]);
        let _ = analyze_spf(&input, 10);
        let _ = analyze_selector("s", &input);
        let _ = analyze_dmarc(&input);
    }
}

#[test]
fn test_any_valid_selector_makes_dkim_valid() {
    let verdict = aggregate(vec![
        analyze_selector("a", &[]),
        analyze_selector("b", &records(&["v=DKIM1; p="])),
        analyze_selector("c", &records(&["v=DKIM1; k=rsa; p=key"])),
    ]);
    assert!(verdict.found);
    assert!(verdict.valid);
    assert!(verdict.valid_count >= 1);
}

#[tokio::test]
async fn test_monitoring_only_domain_scores_warning() {
    let resolver = MockResolver::new()
        .txt("example.org", &["v=spf1 include:_spf.google.com ~all"])
        .txt("google._domainkey.example.org", &["v=DKIM1; k=rsa; p=MIGf"])
        .txt("_dmarc.example.org", &["v=DMARC1; p=none; rua=mailto:d@example.org"]);
    let verifier = Verifier::new(Arc::new(resolver), &Config::default());
    let request = VerificationRequest::new("example.org", "", None).unwrap();

    let report = verifier.verify(&request).await.unwrap();
    let auth = &report.authentication;
    assert!(auth.dmarc.found);
    assert!(!auth.dmarc.valid);
    assert_eq!(auth.overall_score, 80);
    assert_eq!(auth.overall_status, OverallStatus::Pass);
}

#[tokio::test]
async fn test_listed_domain_lowers_reputation_not_authentication() {
    let resolver = MockResolver::new()
        .txt("example.net", &["v=spf1 -all"])
        .a("example.net.dbl.spamhaus.org", &["127.0.1.4"])
        .a("example.net.multi.uribl.com", &["127.0.0.2"])
        .a("example.net.multi.surbl.org", &["127.0.0.1"]);
    let verifier = Verifier::new(Arc::new(resolver), &Config::default());
    let request = VerificationRequest::new("www.example.net", "", None).unwrap();

    let report = verifier.verify(&request).await.unwrap();
    assert_eq!(report.blacklist_summary.listed_count, 2);
    assert_eq!(report.blacklist_summary.unknown_count, 1);
    // SURBL's 127.0.0.1 is a refusal code, not a listing.
    let surbl = report.blacklist.iter().find(|r| r.provider == "SURBL").unwrap();
    assert_eq!(surbl.status, ListingStatus::Unknown);

    // (25 + 15) of 70
    assert_eq!(report.reputation.reputation.score, 43);
    assert_eq!(report.reputation.example.provider, "Spamhaus DBL");
    assert_eq!(
        report.reputation.reputation,
        score_reputation(&report.blacklist, &ScoringPolicy::default())
    );
}
