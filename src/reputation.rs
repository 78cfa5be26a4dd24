//! Domain reputation scoring.
//!
//! Turns blacklist results into a 0-100 score and a letter grade. Each factor
//! contributes its weight to the total only when its provider was actually
//! checked, so a domain-only or IP-only request is scored on what was asked.

use crate::blacklist::{find_provider, PROVIDERS};
use crate::config::ScoringPolicy;
use crate::models::{
    BlacklistCheckResult, CheckType, DelistingExample, DomainReputation, Grade, ListingStatus, ReputationFactor,
};

/// Weight of the combined IP blacklist factor.
pub const IP_FACTOR_WEIGHT: u32 = 30;
const IP_FACTOR_NAME: &str = "IP Blacklists";
const FALLBACK_PROVIDER: &str = "Spamhaus DBL";

/// Factor descriptions for listed domains, keyed by provider name.
static LISTED_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Spamhaus DBL", "Domain is listed on the Spamhaus Domain Block List"),
    ("SURBL", "Domain appears in SURBL for spam or malicious content"),
    ("URIBL", "Domain appears in URIBL for links found in spam"),
    ("Invaluement", "Domain is listed by Invaluement"),
];

fn listed_description(provider: &str) -> String {
    LISTED_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, text)| text.to_string())
        .unwrap_or_else(|| format!("Domain is listed on {}", provider))
}

/// Scores a set of blacklist results. Pure; never fails.
///
/// Every domain result is its own factor weighted by `result.weight`. IP
/// results are combined into one factor of [`IP_FACTOR_WEIGHT`].
pub fn score_reputation(results: &[BlacklistCheckResult], policy: &ScoringPolicy) -> DomainReputation {
    let mut factors = Vec::new();
    let mut total_weight = 0u32;
    let mut penalty = 0u32;

    for result in results.iter().filter(|r| r.check_type == CheckType::Domain) {
        total_weight += result.weight;
        let (impact, description) = match result.status {
            ListingStatus::Listed => {
                penalty += result.weight;
                (-(result.weight as i32), listed_description(&result.provider))
            }
            ListingStatus::Clean => (0, format!("Not listed on {}", result.provider)),
            ListingStatus::Unknown => (0, format!("{} could not be checked", result.provider)),
        };
        factors.push(ReputationFactor {
            name: result.provider.clone(),
            status: result.status,
            impact,
            description,
        });
    }

    let ip_results: Vec<&BlacklistCheckResult> = results.iter().filter(|r| r.check_type == CheckType::Ip).collect();
    if !ip_results.is_empty() {
        total_weight += IP_FACTOR_WEIGHT;
        let listed = ip_results.iter().filter(|r| r.status == ListingStatus::Listed).count() as u32;
        let unknown = ip_results.iter().filter(|r| r.status == ListingStatus::Unknown).count();
        let ip_penalty = IP_FACTOR_WEIGHT.min(listed.saturating_mul(policy.ip_listing_penalty));
        penalty += ip_penalty;

        let (status, description) = if listed > 0 {
            (
                ListingStatus::Listed,
                format!("IP is listed on {} of {} blacklists", listed, ip_results.len()),
            )
        } else if unknown > 0 {
            (
                ListingStatus::Unknown,
                format!("{} of {} IP blacklists could not be checked", unknown, ip_results.len()),
            )
        } else {
            (
                ListingStatus::Clean,
                format!("IP is not listed on any of {} blacklists", ip_results.len()),
            )
        };
        factors.push(ReputationFactor {
            name: IP_FACTOR_NAME.to_string(),
            status,
            impact: -(ip_penalty as i32),
            description,
        });
    }

    let score = if total_weight == 0 {
        100
    } else {
        let raw = 100.0 - 100.0 * f64::from(penalty) / f64::from(total_weight);
        raw.round().clamp(0.0, 100.0) as u8
    };

    DomainReputation {
        score,
        grade: Grade::from_score(score),
        factors,
    }
}

/// Picks the provider to show delisting guidance for: the first listed one in
/// table order, otherwise Spamhaus DBL if it was checked, otherwise the first
/// provider that was checked. With no results at all it names Spamhaus DBL for
/// `domain`.
pub fn delisting_example(results: &[BlacklistCheckResult], domain: Option<&str>) -> DelistingExample {
    let listed = PROVIDERS
        .iter()
        .find_map(|p| results.iter().find(|r| r.is_listed && r.provider == p.name).map(|r| (p, r)));
    let checked = || {
        results
            .iter()
            .find(|r| r.provider == FALLBACK_PROVIDER)
            .or_else(|| results.first())
            .and_then(|r| find_provider(&r.provider).map(|p| (p, r)))
    };

    let (provider, query_name) = match listed.or_else(checked) {
        Some((provider, result)) => (provider, result.query_name.clone()),
        None => {
            let provider = find_provider(FALLBACK_PROVIDER).unwrap_or(&PROVIDERS[0]);
            (provider, format!("{}.{}", domain.unwrap_or("<domain>"), provider.zone))
        }
    };

    DelistingExample {
        provider: provider.name.to_string(),
        description: provider.about.to_string(),
        how_to_check: format!("dig +short A {}", query_name),
        delisting_url: provider.delisting_url.to_string(),
    }
}
