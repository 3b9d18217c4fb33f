//! Query dispatcher: concurrent fan-out with per-source timeouts.
//!
//! A dispatch issues one page request per source and completes only when
//! every request has settled. The join settles each branch independently
//! (`futures::future::join_all` over individually-timed futures), so one
//! failing or slow source never short-circuits the others: a timed-out
//! source is reported exactly like a failed one.
//!
//! Outcomes are returned in request order. Per-source errors are absorbed
//! here and turned into display strings; nothing a source does can make
//! [`Dispatcher::dispatch`] itself fail.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::config::SearchConfig;
use crate::error::SourceError;
use crate::progress::{NoProgress, SearchProgressEvent, SearchProgressReporter};
use federated_search_core::models::{SourceRequest, SourceTarget};
use federated_search_core::source::SourceClient;
use federated_search_core::state::SourceOutcome;

pub struct Dispatcher {
    client: Arc<dyn SourceClient>,
    timeout: Duration,
    window_size: u64,
    progress: Arc<dyn SearchProgressReporter>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn SourceClient>, config: &SearchConfig) -> Self {
        Self {
            client,
            timeout: config.timeout(),
            window_size: config.window_size,
            progress: Arc::new(NoProgress),
        }
    }

    /// Override the per-source timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn SearchProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Default page size `W` for the first window of every source.
    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// First-page requests (`skip_count = 0`, `max_items = W`) for `sources`.
    pub fn first_pages(&self, sources: &[SourceTarget], query_text: &str) -> Vec<SourceRequest> {
        sources
            .iter()
            .map(|target| SourceRequest::first_page(target.clone(), query_text, self.window_size))
            .collect()
    }

    /// Issue every request concurrently and wait for all of them to settle.
    pub async fn dispatch(&self, requests: Vec<SourceRequest>) -> Vec<SourceOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        self.progress.report(SearchProgressEvent::Dispatching {
            sources: requests.len(),
            skip_count: requests.iter().map(|r| r.page.skip_count).max().unwrap_or(0),
        });

        let started = Instant::now();
        let outcomes = join_all(requests.into_iter().map(|request| self.fetch_one(request))).await;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        tracing::info!(
            sources = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch settled"
        );
        outcomes
    }

    async fn fetch_one(&self, request: SourceRequest) -> SourceOutcome {
        tracing::debug!(
            source = %request.target.id,
            skip_count = request.page.skip_count,
            max_items = request.page.max_items,
            "requesting page"
        );

        let result =
            match tokio::time::timeout(self.timeout, self.client.fetch_page(&request.page)).await {
                Ok(Ok(page)) => Ok(page),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(_) => Err(SourceError::Timeout {
                    after: self.timeout,
                }
                .to_string()),
            };

        match &result {
            Ok(page) => {
                tracing::debug!(
                    source = %request.target.id,
                    items = page.items.len(),
                    has_more = page.pagination.has_more_items.unwrap_or(false),
                    "page received"
                );
                self.progress.report(SearchProgressEvent::SourceSettled {
                    source: request.target.id.clone(),
                    ok: true,
                    items: page.items.len(),
                });
            }
            Err(message) => {
                tracing::warn!(source = %request.target.id, error = %message, "source failed");
                self.progress.report(SearchProgressEvent::SourceSettled {
                    source: request.target.id.clone(),
                    ok: false,
                    items: 0,
                });
            }
        }

        SourceOutcome { request, result }
    }
}
