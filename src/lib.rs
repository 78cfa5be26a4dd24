//! authcheck Library
//!
//! This library checks how well a domain is set up to send mail. It covers the
//! SPF, DKIM and DMARC records published in DNS, DNS blocklist listings for a
//! sending IP and for the domain, and a reputation score derived from those
//! listings. All lookups go through a DNS-over-HTTPS resolver and run
//! concurrently under one request deadline.

pub mod api;
pub mod blacklist;
pub mod config;
pub mod dkim;
pub mod dmarc;
pub mod domain;
pub mod error;
pub mod models;
pub mod reputation;
pub mod resolver;
pub mod scoring;
pub mod spf;
pub mod tags;
pub mod verify;
pub mod webhook;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{AuthCheckError, Result};
pub use models::{VerificationReport, VerificationRequest};
pub use resolver::{DnsResolver, DohResolver};
pub use verify::Verifier;
