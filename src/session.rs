//! Federated search session: the aggregate state machine driven by real dispatches.
//!
//! A [`SearchSession`] owns one [`AggregateSearchState`] and is the only
//! thing that mutates it. Each operation follows the same sequence:
//!
//! 1. Apply a `*Started` event under the lock and remember the generation.
//! 2. Release the lock and run the dispatch (all sources, settle-all).
//! 3. Apply the matching `*Settled` event under the lock.
//!
//! The lock is never held across an `.await`. Supersession is handled by
//! the reducer: a settle event whose generation no longer matches the state
//! is dropped, so the results of a query that was replaced while in flight
//! never become visible.
//!
//! Every committed state is published on a `tokio::sync::watch` channel;
//! call [`SearchSession::subscribe`] to observe changes.
//!
//! History is recorded on spawned tasks so queries never wait for it. A
//! short-lived caller (the CLI) must call [`SearchSession::flush_history`]
//! before its runtime shuts down, or pending inserts are cancelled.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use federated_search::config::SearchConfig;
//! use federated_search::dispatch::Dispatcher;
//! use federated_search::history::NoHistory;
//! use federated_search::session::SearchSession;
//! use federated_search_core::models::SourceTarget;
//! use federated_search_core::source::memory::InMemorySource;
//!
//! # async fn example() {
//! let dispatcher = Dispatcher::new(Arc::new(InMemorySource::new()), &SearchConfig::default());
//! let session = SearchSession::new(dispatcher, Arc::new(NoHistory));
//! let sources = vec![SourceTarget::new("prod", "https://prod", "Production")];
//!
//! let state = session.query("budget", &sources).await;
//! if state.combined_pagination.has_more_items {
//!     session.load_more().await;
//! }
//! # }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::history::{HistoryEntry, HistoryRecorder};
use federated_search_core::models::SourceTarget;
use federated_search_core::state::{reduce, AggregateSearchState, SearchEvent};

/// Handle to a federated search session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SearchSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    dispatcher: Dispatcher,
    history: Arc<dyn HistoryRecorder>,
    state: Mutex<AggregateSearchState>,
    updates: watch::Sender<AggregateSearchState>,
    history_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SearchSession {
    pub fn new(dispatcher: Dispatcher, history: Arc<dyn HistoryRecorder>) -> Self {
        let (updates, _) = watch::channel(AggregateSearchState::default());
        Self {
            inner: Arc::new(SessionInner {
                dispatcher,
                history,
                state: Mutex::new(AggregateSearchState::default()),
                updates,
                history_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AggregateSearchState {
        self.lock().clone()
    }

    /// Observe every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<AggregateSearchState> {
        self.inner.updates.subscribe()
    }

    /// Start a new federated query against `sources`.
    ///
    /// Discards everything from earlier queries, including results still in
    /// flight, then fans out to every source and waits for all of them to
    /// settle. Returns the state after settling. If a newer query was issued
    /// meanwhile, the returned state belongs to that newer query and this
    /// query's results are dropped.
    ///
    /// A blank query settles immediately with no items and no dispatch.
    pub async fn query(&self, query_text: &str, sources: &[SourceTarget]) -> AggregateSearchState {
        let generation = self
            .commit(SearchEvent::QueryStarted {
                query_text: query_text.to_string(),
            })
            .generation;

        let requests = if query_text.trim().is_empty() {
            Vec::new()
        } else {
            self.inner.dispatcher.first_pages(sources, query_text)
        };
        tracing::info!(
            generation,
            sources = requests.len(),
            query = %query_text,
            "query started"
        );

        let outcomes = self.inner.dispatcher.dispatch(requests).await;
        let settled = self.commit(SearchEvent::QuerySettled {
            generation,
            outcomes,
        });

        if settled.generation != generation {
            tracing::debug!(generation, current = settled.generation, "query superseded");
        } else if settled.error.is_none() && !query_text.trim().is_empty() {
            self.record_history(HistoryEntry {
                query_text: query_text.to_string(),
                result_count: settled.items.len(),
            });
        }
        settled
    }

    /// Fetch the next page from every source that still has more items.
    ///
    /// Returns `false` without dispatching if a query or another load-more is
    /// in flight, or if no source reports more items. A concurrent second
    /// call is rejected, not queued.
    pub async fn load_more(&self) -> bool {
        let (generation, requests) = {
            let mut state = self.lock();
            if !state.can_load_more() {
                return false;
            }
            let requests = state.load_more_requests();
            let current = take_state(&mut state);
            *state = reduce(current, SearchEvent::LoadMoreStarted);
            self.inner.updates.send_replace(state.clone());
            (state.generation, requests)
        };

        tracing::info!(generation, sources = requests.len(), "load more started");
        let outcomes = self.inner.dispatcher.dispatch(requests).await;
        self.commit(SearchEvent::LoadMoreSettled {
            generation,
            outcomes,
        });
        true
    }

    /// Discard the current query and return to idle. In-flight results are dropped.
    pub fn reset(&self) {
        self.commit(SearchEvent::Reset);
    }

    /// Wait for every history write started so far. Failures were already logged.
    pub async fn flush_history(&self) {
        let pending = std::mem::take(
            &mut *self
                .inner
                .history_tasks
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for task in pending {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "search history task did not complete");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregateSearchState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply one event, publish the result, and return a copy of it.
    fn commit(&self, event: SearchEvent) -> AggregateSearchState {
        let mut state = self.lock();
        let current = take_state(&mut state);
        *state = reduce(current, event);
        self.inner.updates.send_replace(state.clone());
        state.clone()
    }

    fn record_history(&self, entry: HistoryEntry) {
        let history = Arc::clone(&self.inner.history);
        let task = tokio::spawn(async move {
            if let Err(e) = history.record(&entry).await {
                tracing::warn!(
                    error = %e,
                    query = %entry.query_text,
                    "failed to record search history"
                );
            }
        });

        let mut tasks = self
            .inner
            .history_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

/// Move the state out for `reduce`, leaving its generation behind so a
/// panicking reducer cannot rewind the supersession counter.
fn take_state(state: &mut AggregateSearchState) -> AggregateSearchState {
    let generation = state.generation;
    std::mem::replace(
        state,
        AggregateSearchState {
            generation,
            ..Default::default()
        },
    )
}
