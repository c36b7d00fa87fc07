//! Analysis trigger delivery.

use std::time::Duration;

use async_trait::async_trait;
use fairway_core::types::DbId;
use serde::Serialize;

/// Default backoff between attempts: 1s, 2s, 4s.
pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// Default timeout for a single attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Network, DNS, or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analysis service returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Starts downstream analysis of a persisted capture.
///
/// The response body is ignored; only delivery success matters.
#[async_trait]
pub trait AnalysisTrigger: Send + Sync {
    async fn trigger(&self, capture_id: DbId) -> Result<(), TriggerError>;
}

#[derive(Debug, Serialize)]
struct TriggerPayload {
    capture_id: DbId,
}

// ---------------------------------------------------------------------------
// HttpAnalysisTrigger
// ---------------------------------------------------------------------------

pub struct HttpAnalysisTrigger {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl HttpAnalysisTrigger {
    /// Build a trigger for `url` with the given per-attempt timeout and up to
    /// `retries` additional attempts after the first.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retries: usize,
    ) -> Result<Self, TriggerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let retry_delays = (0..retries)
            .map(|i| {
                let secs = DEFAULT_RETRY_DELAYS_SECS
                    .get(i)
                    .copied()
                    .unwrap_or(DEFAULT_RETRY_DELAYS_SECS[DEFAULT_RETRY_DELAYS_SECS.len() - 1]);
                Duration::from_secs(secs)
            })
            .collect();
        Ok(Self {
            client,
            url: url.into(),
            retry_delays,
        })
    }

    /// Replace the backoff schedule. One retry per entry.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn try_send(&self, payload: &TriggerPayload) -> Result<(), TriggerError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(TriggerError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisTrigger for HttpAnalysisTrigger {
    async fn trigger(&self, capture_id: DbId) -> Result<(), TriggerError> {
        let payload = TriggerPayload { capture_id };

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        capture_id,
                        url = %self.url,
                        error = %e,
                        "Analysis trigger attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        self.try_send(&payload).await.inspect_err(|e| {
            tracing::error!(
                capture_id,
                url = %self.url,
                error = %e,
                "Analysis trigger failed after all retries"
            );
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
