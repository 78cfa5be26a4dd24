//! Verification Orchestrator
//!
//! Runs the DNS-authentication branch (SPF, DMARC and every DKIM selector) and
//! the blacklist branch of a request concurrently under a single deadline, then
//! assembles the combined report. Lookups that fail or run out of time degrade
//! into "could not check" findings; the request only fails outright on invalid
//! input or when not a single lookup could be completed.

use crate::blacklist::{self, lookup_failed, summarize};
use crate::config::{Config, ScoringPolicy};
use crate::dkim::check_dkim;
use crate::dmarc::{dmarc_from_lookup, dmarc_name};
use crate::domain::{blacklist_domain, normalize_domain, normalize_selectors};
use crate::error::{AuthCheckError, Result};
use crate::models::{
    BlacklistCheckResult, BlacklistReport, DnsAuthenticationReport, LookupStatus, RecordType, ReputationReport,
    VerificationReport, VerificationRequest,
};
use crate::reputation::{delisting_example, score_reputation};
use crate::resolver::{DnsClient, DnsResolver, DohResolver};
use crate::scoring::build_report;
use crate::spf::spf_from_lookup;
use chrono::Utc;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Verifier {
    client: DnsClient,
    deadline: Duration,
    policy: ScoringPolicy,
}

impl Verifier {
    pub fn new(resolver: Arc<dyn DnsResolver>, config: &Config) -> Self {
        Self {
            client: DnsClient::new(resolver, config.dns_timeout),
            deadline: config.deadline,
            policy: config.scoring.clone(),
        }
    }

    /// Builds a verifier backed by the configured DNS-over-HTTPS endpoint.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let resolver = DohResolver::new(&config.doh_url, config.dns_timeout)?;
        Ok(Self::new(Arc::new(resolver), config))
    }

    /// Full verification: authentication records, blacklists and reputation.
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerificationReport> {
        let domain = normalize_domain(&request.domain)?;
        let selectors = normalize_selectors(&request.dkim_selectors);
        let bare_domain = blacklist_domain(&domain)?;
        let listed_domain = request.check_domain_blacklists.then_some(bare_domain.as_str());
        let deadline = Instant::now() + self.deadline;
        debug!(
            "Verifying {} (selectors: {}, ip: {:?})",
            domain,
            selectors.join(","),
            request.ip
        );

        let (authentication, results) = tokio::join!(
            self.authenticate(&domain, &selectors, deadline),
            blacklist::probe(&self.client, request.ip.as_ref(), listed_domain, deadline),
        );
        let blacklist = self.blacklist_report(results, Some(&bare_domain));

        if authentication_unavailable(&authentication) && all_failed(&blacklist.results) {
            return Err(AuthCheckError::ResolverUnavailable);
        }

        info!(
            "Verified {}: authentication {}/100 ({}), reputation {} ({}), {} of {} blacklists listed",
            domain,
            authentication.overall_score,
            authentication.overall_status,
            blacklist.reputation.reputation.score,
            blacklist.reputation.reputation.grade,
            blacklist.summary.listed_count,
            blacklist.summary.total_checks
        );

        Ok(VerificationReport {
            domain,
            checked_at: Utc::now(),
            authentication,
            blacklist: blacklist.results,
            blacklist_summary: blacklist.summary,
            reputation: blacklist.reputation,
        })
    }

    /// SPF, DKIM and DMARC only.
    pub async fn verify_dns(&self, domain: &str, selectors: &[String]) -> Result<DnsAuthenticationReport> {
        let domain = normalize_domain(domain)?;
        let selectors = normalize_selectors(selectors);
        let deadline = Instant::now() + self.deadline;

        let report = self.authenticate(&domain, &selectors, deadline).await;
        if authentication_unavailable(&report) {
            return Err(AuthCheckError::ResolverUnavailable);
        }
        info!(
            "DNS authentication for {}: {}/100 ({})",
            domain, report.overall_score, report.overall_status
        );
        Ok(report)
    }

    /// Blacklists and reputation for an IP, a domain, or both.
    pub async fn check_blacklist(&self, ip: Option<Ipv4Addr>, domain: Option<&str>) -> Result<BlacklistReport> {
        let domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(blacklist_domain)
            .transpose()?;
        if ip.is_none() && domain.is_none() {
            return Err(AuthCheckError::InvalidInput(
                "Either ip or domain is required".to_string(),
            ));
        }
        let deadline = Instant::now() + self.deadline;

        let results = blacklist::probe(&self.client, ip.as_ref(), domain.as_deref(), deadline).await;
        let report = self.blacklist_report(results, domain.as_deref());
        if all_failed(&report.results) {
            return Err(AuthCheckError::ResolverUnavailable);
        }
        info!(
            "Blacklist check: {} of {} listed, reputation {} ({})",
            report.summary.listed_count,
            report.summary.total_checks,
            report.reputation.reputation.score,
            report.reputation.reputation.grade
        );
        Ok(report)
    }

    async fn authenticate(&self, domain: &str, selectors: &[String], deadline: Instant) -> DnsAuthenticationReport {
        let dmarc_name = dmarc_name(domain);
        let (spf, dmarc, dkim) = tokio::join!(
            self.client.lookup(domain, RecordType::Txt, deadline),
            self.client.lookup(&dmarc_name, RecordType::Txt, deadline),
            check_dkim(&self.client, domain, selectors, deadline),
        );
        build_report(
            spf_from_lookup(&spf, self.policy.spf_lookup_limit),
            dkim,
            dmarc_from_lookup(&dmarc),
        )
    }

    fn blacklist_report(&self, results: Vec<BlacklistCheckResult>, domain: Option<&str>) -> BlacklistReport {
        let summary = summarize(&results);
        let reputation = ReputationReport {
            reputation: score_reputation(&results, &self.policy),
            example: delisting_example(&results, domain),
        };
        BlacklistReport {
            results,
            summary,
            reputation,
        }
    }
}

fn authentication_unavailable(report: &DnsAuthenticationReport) -> bool {
    report.spf.lookup_status == LookupStatus::Failed
        && report.dmarc.lookup_status == LookupStatus::Failed
        && report
            .dkim
            .selectors
            .iter()
            .all(|s| s.lookup_status == LookupStatus::Failed)
}

/// Vacuously true for an empty set: a skipped branch adds no evidence.
fn all_failed(results: &[BlacklistCheckResult]) -> bool {
    results.iter().all(lookup_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DmarcPolicy, Grade, ListingStatus, OverallStatus, SummaryStatus};
    use crate::resolver::mock::MockResolver;
    use async_trait::async_trait;

    fn config() -> Config {
        Config {
            dns_timeout: Duration::from_secs(2),
            deadline: Duration::from_secs(3),
            ..Default::default()
        }
    }

    fn well_configured() -> MockResolver {
        MockResolver::new()
            .txt("example.com", &["v=spf1 include:_spf.google.com ~all"])
            .txt("google._domainkey.example.com", &["v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQC"])
            .txt("_dmarc.example.com", &["v=DMARC1; p=reject; rua=mailto:d@example.com"])
    }

    /// Resolver that is down for every name.
    struct DownResolver;

    #[async_trait]
    impl DnsResolver for DownResolver {
        async fn query(&self, name: &str, _record_type: RecordType) -> Result<crate::models::RawDnsAnswer> {
            Err(AuthCheckError::DnsTransport {
                name: name.to_string(),
                reason: "network unreachable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_fully_configured_domain_passes() {
        let verifier = Verifier::new(Arc::new(well_configured()), &config());
        let request = VerificationRequest::new("example.com", "google", None).unwrap();
        let report = verifier.verify(&request).await.unwrap();

        let auth = &report.authentication;
        assert_eq!(auth.overall_score, 100);
        assert_eq!(auth.overall_status, OverallStatus::Pass);
        assert!(auth.spf.valid);
        assert!(auth.dkim.valid);
        assert!(auth.dmarc.valid);
        assert_eq!(auth.dmarc.policy, Some(DmarcPolicy::Reject));

        // Domain blacklists ran, the IP ones did not.
        assert_eq!(report.blacklist.len(), 4);
        assert_eq!(report.blacklist_summary.status, SummaryStatus::Clean);
        assert_eq!(report.reputation.reputation.score, 100);
    }

    #[tokio::test]
    async fn test_domain_without_records_fails() {
        let verifier = Verifier::new(Arc::new(MockResolver::new()), &config());
        let report = verifier.verify_dns("nothing.example", &["s1".to_string()]).await.unwrap();
        assert_eq!(report.overall_score, 0);
        assert_eq!(report.overall_status, OverallStatus::Fail);
        assert!(!report.spf.found);
        assert!(!report.dkim.found);
        assert!(!report.dmarc.found);
    }

    #[tokio::test]
    async fn test_two_spf_records_are_not_merged() {
        let resolver = well_configured().txt("example.com", &["v=spf1 -all", "v=spf1 include:other.example ~all"]);
        let verifier = Verifier::new(Arc::new(resolver), &config());
        let report = verifier.verify_dns("example.com", &[]).await.unwrap();
        assert!(report.spf.found);
        assert!(!report.spf.valid);
        assert!(report.spf.issues[0].contains("Multiple SPF records"));
        assert_eq!(report.overall_score, 85);
    }

    #[tokio::test]
    async fn test_ip_listed_on_spamhaus_sbl_only() {
        let resolver = MockResolver::new().a("4.3.2.1.sbl.spamhaus.org", &["127.0.0.2"]);
        let verifier = Verifier::new(Arc::new(resolver), &config());
        let report = verifier
            .check_blacklist(Some(Ipv4Addr::new(1, 2, 3, 4)), Some("example.com"))
            .await
            .unwrap();

        assert_eq!(report.summary.listed_count, 1);
        assert_eq!(report.summary.status, SummaryStatus::Warning);
        assert_eq!(report.summary.total_checks, 12);

        let reputation = &report.reputation.reputation;
        assert_eq!(reputation.score, 95);
        assert_eq!(reputation.grade, Grade::A);
        for factor in &reputation.factors {
            if factor.name == "IP Blacklists" {
                assert_eq!(factor.status, ListingStatus::Listed);
                assert_eq!(factor.impact, -5);
            } else {
                assert_eq!(factor.status, ListingStatus::Clean);
                assert_eq!(factor.impact, 0);
            }
        }
        assert_eq!(report.reputation.example.provider, "Spamhaus SBL");
        assert_eq!(
            report.reputation.example.how_to_check,
            "dig +short A 4.3.2.1.sbl.spamhaus.org"
        );
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_network() {
        let resolver = Arc::new(MockResolver::new());
        let verifier = Verifier::new(resolver.clone(), &config());

        let err = verifier.check_blacklist(None, Some("  ")).await.unwrap_err();
        assert!(matches!(err, AuthCheckError::InvalidInput(_)));
        let err = verifier.verify_dns("", &[]).await.unwrap_err();
        assert!(matches!(err, AuthCheckError::InvalidInput(_)));
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolver_down_is_unavailable() {
        let verifier = Verifier::new(Arc::new(DownResolver), &config());
        let request = VerificationRequest::new("example.com", "s1,s2", Some("192.0.2.1")).unwrap();
        assert!(matches!(
            verifier.verify(&request).await,
            Err(AuthCheckError::ResolverUnavailable)
        ));
        assert!(matches!(
            verifier.check_blacklist(Some(Ipv4Addr::new(192, 0, 2, 1)), None).await,
            Err(AuthCheckError::ResolverUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_still_yields_a_report() {
        let resolver = well_configured()
            .fail("_dmarc.example.com", RecordType::Txt)
            .fail("example.com.dbl.spamhaus.org", RecordType::A);
        let verifier = Verifier::new(Arc::new(resolver), &config());
        let request = VerificationRequest::new("example.com", "google", None).unwrap();
        let report = verifier.verify(&request).await.unwrap();

        assert!(report.authentication.spf.valid);
        assert_eq!(report.authentication.dmarc.lookup_status, LookupStatus::Failed);
        assert_eq!(report.authentication.overall_score, 65);
        assert_eq!(report.blacklist_summary.unknown_count, 1);
    }

    #[tokio::test]
    async fn test_deadline_bounds_the_whole_request() {
        let resolver = well_configured()
            .delayed("slow._domainkey.example.com", RecordType::Txt, Duration::from_secs(30), &["v=DKIM1; p=k"])
            .delayed("example.com.multi.uribl.com", RecordType::A, Duration::from_secs(30), &["127.0.0.2"]);
        let config = Config {
            dns_timeout: Duration::from_secs(20),
            deadline: Duration::from_millis(300),
            ..Default::default()
        };
        let verifier = Verifier::new(Arc::new(resolver), &config);
        let request = VerificationRequest::new("example.com", "google,slow", None).unwrap();

        let started = Instant::now();
        let report = verifier.verify(&request).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));

        let slow = &report.authentication.dkim.selectors[1];
        assert_eq!(slow.selector, "slow");
        assert_eq!(slow.lookup_status, LookupStatus::Failed);
        assert!(report.authentication.dkim.valid);

        let uribl = report.blacklist.iter().find(|r| r.provider == "URIBL").unwrap();
        assert_eq!(uribl.status, ListingStatus::Unknown);
        assert!(!uribl.is_listed);
    }

    #[tokio::test]
    async fn test_blacklist_branch_can_be_skipped() {
        let resolver = Arc::new(well_configured());
        let verifier = Verifier::new(resolver.clone(), &config());
        let request = VerificationRequest::new("https://www.Example.com/path", "google", None)
            .unwrap()
            .with_domain_blacklists(false);
        let report = verifier.verify(&request).await.unwrap();

        assert_eq!(report.domain, "www.example.com");
        assert!(report.blacklist.is_empty());
        assert_eq!(report.reputation.reputation.score, 100);
        assert_eq!(report.reputation.reputation.grade, Grade::A);
        assert_eq!(
            report.reputation.example.how_to_check,
            "dig +short A example.com.dbl.spamhaus.org"
        );
        // SPF, DMARC and one selector.
        assert_eq!(resolver.call_count(), 3);
    }

    #[tokio::test]
    async fn test_hand_built_request_is_normalized() {
        let resolver = Arc::new(well_configured());
        let verifier = Verifier::new(resolver.clone(), &config());
        let request = VerificationRequest {
            domain: "HTTPS://Example.com/path".to_string(),
            dkim_selectors: vec![" ".to_string()],
            ip: None,
            check_domain_blacklists: true,
        };
        let report = verifier.verify(&request).await.unwrap();

        assert_eq!(report.domain, "example.com");
        assert_eq!(report.authentication.overall_score, 100);
        assert_eq!(report.authentication.dkim.total_checked, 1);
        assert_eq!(report.authentication.dkim.selectors[0].selector, "google");
        let dbl = report.blacklist.iter().find(|r| r.provider == "Spamhaus DBL").unwrap();
        assert_eq!(dbl.query_name, "example.com.dbl.spamhaus.org");

        let verify_dns = verifier.verify_dns("HTTPS://Example.com/path", &[]).await.unwrap();
        assert_eq!(verify_dns.overall_score, report.authentication.overall_score);

        let empty = VerificationRequest {
            domain: "   ".to_string(),
            ..request
        };
        let calls = resolver.call_count();
        assert!(matches!(verifier.verify(&empty).await, Err(AuthCheckError::InvalidInput(_))));
        assert_eq!(resolver.call_count(), calls);
    }

    #[tokio::test]
    async fn test_blacklist_queries_use_the_bare_domain() {
        let resolver = well_configured().a("example.com.dbl.spamhaus.org", &["127.0.1.2"]);
        let verifier = Verifier::new(Arc::new(resolver), &config());
        let report = verifier
            .check_blacklist(None, Some("https://www.example.com/landing"))
            .await
            .unwrap();
        let dbl = report.results.iter().find(|r| r.provider == "Spamhaus DBL").unwrap();
        assert!(dbl.is_listed);
        assert_eq!(dbl.query_name, "example.com.dbl.spamhaus.org");
        assert_eq!(report.reputation.reputation.score, 64);
    }
}
