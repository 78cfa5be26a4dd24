//! HTTP API Module
//!
//! Request bodies, handlers and the axum router for the three verification
//! endpoints plus a health check. Handlers are thin: they turn loosely typed
//! JSON into validated requests and hand them to the [`Verifier`].
//!
//! Errors are returned as `{ "error": "..." }`. Invalid input, including a body
//! that is not valid JSON for the endpoint, maps to 400 and a
//! resolver that answered nothing at all maps to 503. Everything else is a 500
//! with a generic message.

use crate::domain::{parse_ip, parse_selectors};
use crate::error::AuthCheckError;
use crate::models::{BlacklistReport, DnsAuthenticationReport, VerificationReport, VerificationRequest};
use crate::verify::Verifier;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDnsBody {
    pub domain: Option<String>,
    /// One selector or a comma-separated list.
    pub dkim_selector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckBlacklistBody {
    pub ip: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub domain: Option<String>,
    pub dkim_selector: Option<String>,
    pub ip: Option<String>,
    #[serde(default)]
    pub skip_domain_blacklists: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub AuthCheckError);

impl From<AuthCheckError> for ApiError {
    fn from(err: AuthCheckError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            AuthCheckError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthCheckError::ResolverUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match &self.0 {
            AuthCheckError::InvalidInput(msg) => msg.clone(),
            AuthCheckError::ResolverUnavailable => self.0.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Rejected request: {}", self.0);
        }
        (status, Json(ErrorResponse { error: self.message() })).into_response()
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthCheckError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthCheckError::InvalidInput(rejection.body_text()))
}

fn required_domain(domain: Option<&str>) -> Result<&str, AuthCheckError> {
    domain
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AuthCheckError::InvalidInput("Domain is required".to_string()))
}

/// POST /verify-dns
pub async fn verify_dns_handler(
    State(verifier): State<Arc<Verifier>>,
    payload: Result<Json<VerifyDnsBody>, JsonRejection>,
) -> ApiResult<DnsAuthenticationReport> {
    let body = json_body(payload)?;
    let domain = required_domain(body.domain.as_deref())?;
    let selectors = parse_selectors(body.dkim_selector.as_deref().unwrap_or_default());
    info!("verify-dns for {} (selectors: {})", domain, selectors.join(","));
    let report = verifier.verify_dns(domain, &selectors).await?;
    Ok(Json(report))
}

/// POST /check-blacklist
pub async fn check_blacklist_handler(
    State(verifier): State<Arc<Verifier>>,
    payload: Result<Json<CheckBlacklistBody>, JsonRejection>,
) -> ApiResult<BlacklistReport> {
    let body = json_body(payload)?;
    let ip = parse_ip(body.ip.as_deref())?;
    info!("check-blacklist for ip={:?} domain={:?}", ip, body.domain);
    let report = verifier.check_blacklist(ip, body.domain.as_deref()).await?;
    Ok(Json(report))
}

/// POST /verify
pub async fn verify_handler(
    State(verifier): State<Arc<Verifier>>,
    payload: Result<Json<VerifyBody>, JsonRejection>,
) -> ApiResult<VerificationReport> {
    let body = json_body(payload)?;
    let domain = required_domain(body.domain.as_deref())?;
    let request = VerificationRequest::new(
        domain,
        body.dkim_selector.as_deref().unwrap_or_default(),
        body.ip.as_deref(),
    )?
    .with_domain_blacklists(!body.skip_domain_blacklists);
    let report = verifier.verify(&request).await?;
    Ok(Json(report))
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(verifier: Arc<Verifier>) -> Router {
    Router::new()
        .route("/verify-dns", post(verify_dns_handler))
        .route("/check-blacklist", post(check_blacklist_handler))
        .route("/verify", post(verify_handler))
        .route("/health", get(health_handler))
        .with_state(verifier)
}

/// Serves the API on `bind_addr` until Ctrl+C or SIGTERM.
pub async fn serve(verifier: Arc<Verifier>, bind_addr: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(verifier))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
