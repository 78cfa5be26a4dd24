//! authcheck - Mail domain authentication and reputation checker
//!
//! This tool verifies the SPF, DKIM and DMARC records of a domain, probes DNS
//! blocklists for a sending IP and the domain itself, and scores the domain's
//! reputation. It can also serve the same checks over HTTP.
//!
//! The tool outputs results in one of three formats: Table, CSV, or JSON.

use anyhow::{Context, Result};
use authcheck::api;
use authcheck::domain::parse_ip;
use authcheck::models::{
    BlacklistCheckResult, BlacklistSummary, DnsAuthenticationReport, ListingStatus, OverallStatus,
    ReputationReport, SummaryStatus, VerificationRequest,
};
use authcheck::webhook::WebhookHandler;
use authcheck::{Config, Verifier};
use clap::{Parser, Subcommand};
use colored::*;
use prettytable::{row, Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// CLI arguments for authcheck.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Mail domain authentication and reputation checker",
    long_about = "authcheck verifies SPF, DKIM and DMARC records, checks DNS blocklists \
                  for an IP and a domain, and scores the domain's reputation.\n\n\
                  USAGE:\n  authcheck verify <DOMAIN> [-s <selectors>] [--ip <IP>] [--output <table|csv|json>]\n  \
                  authcheck blacklist [--ip <IP>] [--domain <DOMAIN>]\n  authcheck serve [--bind <ADDR>]"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format: table, csv, json
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify authentication records, blacklists and reputation of a domain
    Verify {
        /// Domain to verify (a URL is accepted too)
        domain: String,

        /// DKIM selector, or a comma-separated list of selectors
        #[arg(short, long, default_value = "")]
        selectors: String,

        /// Sending IPv4 address to check against IP blacklists
        #[arg(long)]
        ip: Option<String>,

        /// Do not query domain blacklists
        #[arg(long)]
        skip_domain_blacklists: bool,
    },
    /// Check an IP and/or a domain against DNS blacklists
    Blacklist {
        #[arg(long)]
        ip: Option<String>,

        #[arg(long)]
        domain: Option<String>,
    },
    /// Serve the HTTP API
    Serve {
        /// Address to bind, overrides AUTHCHECK_BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Supported output formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// One flat line of CSV output.
#[derive(Debug, Serialize)]
struct CsvRow {
    category: String,
    check: String,
    status: String,
    detail: String,
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn overall_status_label(status: OverallStatus) -> ColoredString {
    match status {
        OverallStatus::Pass => status.to_string().green().bold(),
        OverallStatus::Warning => status.to_string().yellow().bold(),
        OverallStatus::Fail => status.to_string().red().bold(),
    }
}

fn summary_status_label(status: SummaryStatus) -> ColoredString {
    match status {
        SummaryStatus::Clean => status.to_string().green().bold(),
        SummaryStatus::Warning => status.to_string().yellow().bold(),
        SummaryStatus::Critical => status.to_string().red().bold(),
    }
}

fn authentication_rows(report: &DnsAuthenticationReport) -> Vec<CsvRow> {
    let verdict = |found: bool, valid: bool| match (found, valid) {
        (false, _) => "missing",
        (true, false) => "invalid",
        (true, true) => "valid",
    };
    let mut rows = vec![CsvRow {
        category: "authentication".to_string(),
        check: "SPF".to_string(),
        status: verdict(report.spf.found, report.spf.valid).to_string(),
        detail: report.spf.issues.join("; "),
    }];
    for selector in &report.dkim.selectors {
        rows.push(CsvRow {
            category: "authentication".to_string(),
            check: format!("DKIM ({})", selector.selector),
            status: verdict(selector.found, selector.valid).to_string(),
            detail: selector.issues.join("; "),
        });
    }
    rows.push(CsvRow {
        category: "authentication".to_string(),
        check: "DMARC".to_string(),
        status: verdict(report.dmarc.found, report.dmarc.valid).to_string(),
        detail: report.dmarc.issues.join("; "),
    });
    rows.push(CsvRow {
        category: "authentication".to_string(),
        check: "score".to_string(),
        status: report.overall_status.to_string(),
        detail: report.overall_score.to_string(),
    });
    rows
}

fn blacklist_rows(results: &[BlacklistCheckResult], reputation: &ReputationReport) -> Vec<CsvRow> {
    let mut rows: Vec<CsvRow> = results
        .iter()
        .map(|r| CsvRow {
            category: format!("blacklist-{}", r.check_type),
            check: r.provider.clone(),
            status: r.status.to_string(),
            detail: r
                .code_info
                .as_ref()
                .map(|info| info.description.clone())
                .unwrap_or_default(),
        })
        .collect();
    rows.push(CsvRow {
        category: "reputation".to_string(),
        check: "score".to_string(),
        status: reputation.reputation.grade.to_string(),
        detail: reputation.reputation.score.to_string(),
    });
    rows
}

fn write_csv(rows: &[CsvRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_authentication(report: &DnsAuthenticationReport) {
    println!("{}", "DNS Authentication".bold().blue());
    println!("{}", "----------------------------".dimmed());

    let mut table = Table::new();
    table.add_row(row!["Check", "Found", "Valid", "Record"]);
    table.add_row(Row::new(vec![
        Cell::new("SPF"),
        Cell::new(yes_no(report.spf.found)),
        Cell::new(yes_no(report.spf.valid)),
        Cell::new(report.spf.record.as_deref().unwrap_or("-")),
    ]));
    for selector in &report.dkim.selectors {
        table.add_row(Row::new(vec![
            Cell::new(&format!("DKIM ({})", selector.selector)),
            Cell::new(yes_no(selector.found)),
            Cell::new(yes_no(selector.valid)),
            Cell::new(selector.record.as_deref().unwrap_or("-")),
        ]));
    }
    let policy = report
        .dmarc
        .policy
        .as_ref()
        .map(|p| format!("DMARC (p={})", p))
        .unwrap_or_else(|| "DMARC".to_string());
    table.add_row(Row::new(vec![
        Cell::new(&policy),
        Cell::new(yes_no(report.dmarc.found)),
        Cell::new(yes_no(report.dmarc.valid)),
        Cell::new(report.dmarc.record.as_deref().unwrap_or("-")),
    ]));
    table.printstd();

    let issues: Vec<&String> = report
        .spf
        .issues
        .iter()
        .chain(&report.dkim.issues)
        .chain(&report.dmarc.issues)
        .collect();
    if !issues.is_empty() {
        println!("{}", "Issues".bold());
        for issue in issues {
            println!("  {} {}", "!".yellow(), issue);
        }
    }
    let recommendations: Vec<&String> = report
        .spf
        .recommendations
        .iter()
        .chain(&report.dkim.recommendations)
        .chain(&report.dmarc.recommendations)
        .collect();
    if !recommendations.is_empty() {
        println!("{}", "Recommendations".bold());
        for recommendation in recommendations {
            println!("  {} {}", "-".dimmed(), recommendation);
        }
    }
    println!(
        "{}: {}/100 ({})\n",
        "Authentication score".bold(),
        report.overall_score,
        overall_status_label(report.overall_status)
    );
}

fn print_blacklists(results: &[BlacklistCheckResult], summary: &BlacklistSummary, reputation: &ReputationReport) {
    println!("{}", "Blacklists".bold().blue());
    println!("{}", "----------------------------".dimmed());

    if results.is_empty() {
        println!("{}", "No blacklist checks were run.".yellow());
    } else {
        let mut table = Table::new();
        table.add_row(row!["Provider", "Type", "Status", "Code", "Details"]);
        for r in results {
            let details = r
                .code_info
                .as_ref()
                .map(|info| format!("{} ({})", info.description, info.kind))
                .unwrap_or_default();
            table.add_row(Row::new(vec![
                Cell::new(&r.provider),
                Cell::new(&r.check_type.to_string()),
                Cell::new(&r.status.to_string()),
                Cell::new(r.return_code.as_deref().unwrap_or("-")),
                Cell::new(&details),
            ]));
        }
        table.printstd();
    }
    println!(
        "{}: {} listed, {} clean, {} unknown of {} ({})",
        "Summary".bold(),
        summary.listed_count,
        summary.clean_count,
        summary.unknown_count,
        summary.total_checks,
        summary_status_label(summary.status)
    );

    let rep = &reputation.reputation;
    println!("{}: {}/100 (grade {})", "Reputation".bold(), rep.score, rep.grade);
    for factor in rep.factors.iter().filter(|f| f.status != ListingStatus::Clean) {
        println!("  {} {} ({})", "!".yellow(), factor.description, factor.impact);
    }
    let example = &reputation.example;
    println!(
        "{}: {}\n  check:   {}\n  delist:  {}\n",
        "Delisting".bold(),
        example.provider,
        example.how_to_check,
        example.delisting_url
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let config = Config::new().context("Failed to load configuration")?;
    let verifier = Verifier::from_config(&config).context("Failed to initialize resolver")?;

    if matches!(cli.output, OutputFormat::Table) && !matches!(cli.command, Command::Serve { .. }) {
        println!(
            "{}\n{}\n",
            "authcheck - Mail Domain Checker".bold().green(),
            "SPF, DKIM, DMARC, blacklists & reputation".dimmed()
        );
    }

    match cli.command {
        Command::Verify {
            domain,
            selectors,
            ip,
            skip_domain_blacklists,
        } => {
            let request = VerificationRequest::new(&domain, &selectors, ip.as_deref())?
                .with_domain_blacklists(!skip_domain_blacklists);
            log::info!("Verifying {}", request.domain);
            let report = verifier.verify(&request).await.context("Verification failed")?;

            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Csv => {
                    let mut rows = authentication_rows(&report.authentication);
                    rows.extend(blacklist_rows(&report.blacklist, &report.reputation));
                    write_csv(&rows)?;
                }
                OutputFormat::Table => {
                    println!("{}: {}\n", "Domain".bold(), report.domain);
                    print_authentication(&report.authentication);
                    print_blacklists(&report.blacklist, &report.blacklist_summary, &report.reputation);
                }
            }

            if let Some(url) = &config.webhook_url {
                log::info!("Sending report to webhook: {}", url);
                WebhookHandler::new(url, Duration::from_secs(config.webhook_timeout), config.webhook_retries)?
                    .send(&report)
                    .await
                    .context("Failed to send webhook")?;
            }
        }
        Command::Blacklist { ip, domain } => {
            let ip = parse_ip(ip.as_deref())?;
            let report = verifier
                .check_blacklist(ip, domain.as_deref())
                .await
                .context("Blacklist check failed")?;

            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Csv => write_csv(&blacklist_rows(&report.results, &report.reputation))?,
                OutputFormat::Table => print_blacklists(&report.results, &report.summary, &report.reputation),
            }
        }
        Command::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            api::serve(Arc::new(verifier), &bind_addr).await?;
        }
    }

    log::info!("{}", "Done!".bold().cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use authcheck::models::{DkimSelectorVerdict, DkimVerdict, DmarcVerdict, LookupStatus, SpfVerdict};

    #[test]
    fn test_output_format_parsing() {
        assert!(matches!(OutputFormat::from_str("table"), Ok(OutputFormat::Table)));
        assert!(matches!(OutputFormat::from_str("CSV"), Ok(OutputFormat::Csv)));
        assert!(matches!(OutputFormat::from_str("json"), Ok(OutputFormat::Json)));
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["authcheck", "verify", "example.com", "-s", "s1,s2", "--ip", "192.0.2.1", "-o", "json"]);
        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Command::Verify { domain, selectors, ip, skip_domain_blacklists } => {
                assert_eq!(domain, "example.com");
                assert_eq!(selectors, "s1,s2");
                assert_eq!(ip.as_deref(), Some("192.0.2.1"));
                assert!(!skip_domain_blacklists);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_authentication_rows() {
        let report = DnsAuthenticationReport {
            spf: SpfVerdict {
                found: true,
                valid: true,
                ..Default::default()
            },
            dkim: DkimVerdict {
                selectors: vec![DkimSelectorVerdict {
                    selector: "s1".to_string(),
                    found: false,
                    valid: false,
                    record: None,
                    issues: vec!["No DKIM record found for selector \"s1\"".to_string()],
                    lookup_status: LookupStatus::NoRecords,
                }],
                ..Default::default()
            },
            dmarc: DmarcVerdict::default(),
            overall_score: 30,
            overall_status: OverallStatus::Fail,
        };
        let rows = authentication_rows(&report);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].status, "valid");
        assert_eq!(rows[1].check, "DKIM (s1)");
        assert_eq!(rows[1].status, "missing");
        assert_eq!(rows[3].detail, "30");
    }
}
