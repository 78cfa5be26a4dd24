//! Error Handling Module
//!
//! This module defines custom error types for authcheck using the `thiserror` crate.
//! Per-lookup failures (`DnsTransport`, `Timeout`, `ResolverStatus`, `Http`, `Json`)
//! are recovered by the orchestrator and reported as "could not check" findings.
//! Only input validation and complete resolver unavailability reach its caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthCheckError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("DNS transport error for {name}: {reason}")]
    DnsTransport { name: String, reason: String },

    #[error("DNS query for {name} timed out")]
    Timeout { name: String },

    #[error("Resolver returned status {status} for {name}")]
    ResolverStatus { name: String, status: u32 },

    #[error("DNS resolver unavailable: every lookup failed")]
    ResolverUnavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuthCheckError>;
