//! REST client for the analytics backend.
//!
//! Two concerns only: point-in-time pulls of the active escalation
//! set, and the approve/reject mutation actions. Requests carry a
//! bounded timeout so a hung fetch is a failure, never a stall. A
//! failed fetch leaves last-known-good state untouched upstream.

pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};
use url::Url;

use esq_core::{EscalationId, EscalationRecord, Snapshot};

pub use error::{ApiError, ApiResult};

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `https://backend.example/api`.
    pub base_url: String,
    /// Per-request timeout; a fetch exceeding it is a Failure.
    pub request_timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Builder: set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Anything the engine can pull a snapshot from.
///
/// The real implementation is [`ApiClient`]; tests drive the engine
/// with a scripted fake.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Pull the full active escalation set.
    async fn fetch_active(&self) -> ApiResult<Snapshot>;
}

/// The approve/reject mutation surface.
///
/// On success the caller triggers a snapshot refresh so the queue
/// reflects the backend's recomputed state.
#[async_trait]
pub trait EscalationActions: Send + Sync {
    /// Approve an escalation.
    ///
    /// # Errors
    /// Returns `ApiError::Http` on a non-success status.
    async fn approve(&self, id: &EscalationId) -> ApiResult<()>;

    /// Reject an escalation.
    ///
    /// # Errors
    /// Returns `ApiError::Http` on a non-success status.
    async fn reject(&self, id: &EscalationId) -> ApiResult<()>;
}

/// Reqwest-backed client for the backend's REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidUrl` for an unparsable base URL, or
    /// `ApiError::Transport` when the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn action(&self, id: &EscalationId, verb: &str) -> ApiResult<()> {
        let url = self.endpoint(&format!("/escalations/{id}/{verb}"));
        let response = self.http.post(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, message });
        }
        debug!(verb, "escalation action accepted");
        Ok(())
    }
}

#[async_trait]
impl EscalationActions for ApiClient {
    #[instrument(skip(self), fields(id = %id))]
    async fn approve(&self, id: &EscalationId) -> ApiResult<()> {
        self.action(id, "approve").await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn reject(&self, id: &EscalationId) -> ApiResult<()> {
        self.action(id, "reject").await
    }
}

#[async_trait]
impl SnapshotSource for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_active(&self) -> ApiResult<Snapshot> {
        let url = self.endpoint("/escalations/active");
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, message });
        }

        let records: Vec<EscalationRecord> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        debug!(count = records.len(), "snapshot fetched");
        Ok(Snapshot::new(records, Utc::now()))
    }
}
