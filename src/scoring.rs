//! DNS authentication scoring.
//!
//! Points out of 100: SPF 15 found + 15 valid, DKIM 15 found + 20 valid, DMARC
//! 15 found + 20 valid. Alerting built on top of these numbers depends on the
//! exact weights.

use crate::models::{DkimVerdict, DmarcVerdict, DnsAuthenticationReport, OverallStatus, SpfVerdict};

const MAX_POINTS: u32 = 100;

pub fn authentication_score(spf: &SpfVerdict, dkim: &DkimVerdict, dmarc: &DmarcVerdict) -> u8 {
    let mut points = 0u32;
    if spf.found {
        points += 15;
    }
    if spf.valid {
        points += 15;
    }
    if dkim.found {
        points += 15;
    }
    if dkim.valid {
        points += 20;
    }
    if dmarc.found {
        points += 15;
    }
    if dmarc.valid {
        points += 20;
    }
    let score = (f64::from(points) / f64::from(MAX_POINTS) * 100.0).round();
    score.clamp(0.0, 100.0) as u8
}

pub fn build_report(spf: SpfVerdict, dkim: DkimVerdict, dmarc: DmarcVerdict) -> DnsAuthenticationReport {
    let overall_score = authentication_score(&spf, &dkim, &dmarc);
    DnsAuthenticationReport {
        spf,
        dkim,
        dmarc,
        overall_score,
        overall_status: OverallStatus::from_score(overall_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spf(found: bool, valid: bool) -> SpfVerdict {
        SpfVerdict {
            found,
            valid,
            ..Default::default()
        }
    }
    fn dkim(found: bool, valid: bool) -> DkimVerdict {
        DkimVerdict {
            found,
            valid,
            ..Default::default()
        }
    }
    fn dmarc(found: bool, valid: bool) -> DmarcVerdict {
        DmarcVerdict {
            found,
            valid,
            ..Default::default()
        }
    }

    #[test]
    fn test_nothing_found_scores_zero() {
        let report = build_report(spf(false, false), dkim(false, false), dmarc(false, false));
        assert_eq!(report.overall_score, 0);
        assert_eq!(report.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_everything_valid_scores_full_marks() {
        let report = build_report(spf(true, true), dkim(true, true), dmarc(true, true));
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.overall_status, OverallStatus::Pass);
    }

    #[test]
    fn test_weights() {
        assert_eq!(authentication_score(&spf(true, true), &dkim(false, false), &dmarc(false, false)), 30);
        assert_eq!(authentication_score(&spf(false, false), &dkim(true, true), &dmarc(false, false)), 35);
        assert_eq!(authentication_score(&spf(false, false), &dkim(false, false), &dmarc(true, true)), 35);
        // Found but broken everywhere.
        assert_eq!(authentication_score(&spf(true, false), &dkim(true, false), &dmarc(true, false)), 45);
    }

    #[test]
    fn test_status_bands_for_partial_setups() {
        let report = build_report(spf(true, true), dkim(true, true), dmarc(true, false));
        assert_eq!(report.overall_score, 80);
        assert_eq!(report.overall_status, OverallStatus::Pass);

        let report = build_report(spf(true, false), dkim(true, true), dmarc(true, false));
        assert_eq!(report.overall_score, 65);
        assert_eq!(report.overall_status, OverallStatus::Warning);
    }
}
