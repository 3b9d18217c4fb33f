//! HTTP [`SourceClient`] backed by `reqwest`.
//!
//! Sends one `POST {address}/search` per page request:
//!
//! ```json
//! { "query": "budget", "paging": { "maxItems": 50, "skipCount": 0 } }
//! ```
//!
//! and decodes a camelCase response of the shape
//!
//! ```json
//! {
//!   "items": [ { "id": "…", "name": "…", "modifiedAt": "2024-05-01T10:00:00.000+0000", … } ],
//!   "pagination": { "count": 50, "hasMoreItems": true, "totalItems": 120, "skipCount": 0, "maxItems": 50 }
//! }
//! ```
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5), and never longer
//!   than one attempt's timeout
//!
//! Retries happen inside the dispatcher's per-source timeout, so a source
//! that keeps failing is still cut off on time. Each attempt gets an equal
//! share of that budget (`timeout / (max_retries + 1)`), which leaves room
//! for the retries after a hung first attempt.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::config::SearchConfig;
use crate::error::SourceError;
use federated_search_core::models::{PageRequest, RawPage};
use federated_search_core::source::SourceClient;

pub struct HttpSourceClient {
    client: Client,
    max_retries: u32,
    attempt_timeout: Duration,
    backoff_base: Duration,
}

impl HttpSourceClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SourceError> {
        let client = Client::builder().build().map_err(SourceError::Client)?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            attempt_timeout: attempt_timeout(config),
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay (doubles per retry).
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    async fn fetch_once(&self, url: &str, request: &PageRequest) -> Result<RawPage, SourceError> {
        let body = serde_json::json!({
            "query": request.query_text,
            "paging": {
                "maxItems": request.max_items,
                "skipCount": request.skip_count,
            },
        });

        let response = self
            .client
            .post(url)
            .timeout(self.attempt_timeout)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| SourceError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| SourceError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: truncate(&text, 200),
            });
        }

        decode_page(url, &text)
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage> {
        let url = search_url(&request.address);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff_base, attempt, self.attempt_timeout);
                tracing::debug!(
                    source = %request.source_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying page request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(&url, request).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() => last_err = Some(e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("page request failed after retries")))
    }
}

/// Share of the per-source timeout available to one attempt.
fn attempt_timeout(config: &SearchConfig) -> Duration {
    config.timeout() / config.max_retries.saturating_add(1)
}

/// Exponential backoff before retry `attempt` (1-based): base, 2×base, up to
/// 32×base, never more than `cap`.
fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1u32 << (attempt.saturating_sub(1)).min(5);
    (base * factor).min(cap)
}

fn search_url(address: &str) -> String {
    format!("{}/search", address.trim_end_matches('/'))
}

/// Decode a response body into a [`RawPage`].
fn decode_page(url: &str, body: &str) -> Result<RawPage, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push('…');
    out
}
