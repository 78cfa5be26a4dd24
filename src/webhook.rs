//! Webhook Module
//!
//! This module delivers finished verification reports to a remote webhook.
//! It supports retries with exponential backoff and properly handles timeouts.
use crate::models::VerificationReport;
use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    report: &'a VerificationReport,
    timestamp: chrono::DateTime<chrono::Utc>,
    version: &'static str,
}

/// WebhookHandler is responsible for sending reports to a webhook URL.
#[derive(Debug)]
pub struct WebhookHandler {
    client: Client,
    url: Url,
    max_retries: u32,
    base_delay: Duration,
}

impl WebhookHandler {
    /// Creates a new WebhookHandler with the given URL, timeout, and retry count.
    pub fn new(url: impl AsRef<str>, timeout: Duration, max_retries: u32) -> Result<Self> {
        let url = Url::parse(url.as_ref()).context("Invalid webhook URL")?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url,
            max_retries,
            base_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the first backoff step (doubles on every retry).
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sends the report asynchronously.
    ///
    /// Retries are attempted with exponential backoff. Returns an error if all retries fail.
    pub async fn send(&self, report: &VerificationReport) -> Result<()> {
        let payload = WebhookPayload {
            report,
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
        };
        let mut last_error = None;
        for retry in 0..=self.max_retries {
            if retry > 0 {
                let delay = self.base_delay * 2u32.saturating_pow(retry - 1);
                log::info!("Retrying webhook send in {:?}...", delay);
                sleep(delay).await;
            }
            match self.client.post(self.url.clone()).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    log::info!(
                        "Delivered report for {} (attempt {})",
                        report.domain,
                        retry + 1
                    );
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    log::warn!(
                        "Webhook attempt {} failed: HTTP {} - Response: {}",
                        retry + 1,
                        status,
                        body
                    );
                    last_error = Some(format!("HTTP {} - {}", status, body));
                }
                Err(e) => {
                    log::warn!("Webhook attempt {} encountered error: {}", retry + 1, e);
                    last_error = Some(if e.is_timeout() {
                        "timeout".to_string()
                    } else {
                        e.to_string()
                    });
                }
            }
        }
        Err(anyhow::anyhow!(
            "Webhook failed after {} attempts: {}",
            self.max_retries + 1,
            last_error.unwrap_or_default()
        ))
    }
}
