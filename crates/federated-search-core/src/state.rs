//! Aggregate search state and its pure reducer.
//!
//! Every mutation of an [`AggregateSearchState`] goes through [`reduce`],
//! which maps `(state, event)` to the next state without performing I/O.
//! The caller owns the state and is responsible for running the dispatches
//! that produce the `*Settled` events.
//!
//! # States
//!
//! ```text
//!  Idle ──QueryStarted──▶ Loading ──QuerySettled──▶ Ready
//!                           ▲                       │  ▲
//!                           │              LoadMoreStarted
//!       QueryStarted (any) ─┘                       ▼  │
//!                                            LoadingMore ─LoadMoreSettled─┘
//! ```
//!
//! # Supersession
//!
//! `QueryStarted` and `Reset` bump [`AggregateSearchState::generation`].
//! Settle events carry the generation they were dispatched under; a settle
//! event from an older generation is ignored, so a slow response to a
//! superseded query can never overwrite a newer one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::merge::{merge_items, tag_page};
use crate::models::{RawPage, SearchResultItem, SourceRequest};
use crate::pagination::{combine, CombinedPagination, PerSourcePaginationState};

/// Lifecycle of an aggregate search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStatus {
    /// No query issued yet (or explicitly reset).
    #[default]
    Idle,
    /// Initial fan-out in flight.
    Loading,
    /// Items available, possibly none.
    Ready,
    /// Incremental fan-out in flight; previous items stay visible.
    LoadingMore,
}

/// The settled result of one per-source request.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub request: SourceRequest,
    /// The page, or a display message describing why the source failed.
    pub result: Result<RawPage, String>,
}

/// Events accepted by [`reduce`].
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// A new query replaces whatever came before.
    QueryStarted { query_text: String },
    /// The initial fan-out of `generation` has settled.
    QuerySettled {
        generation: u64,
        outcomes: Vec<SourceOutcome>,
    },
    /// Begin fetching the next page from every source that has more.
    LoadMoreStarted,
    /// The incremental fan-out of `generation` has settled.
    LoadMoreSettled {
        generation: u64,
        outcomes: Vec<SourceOutcome>,
    },
    /// Discard everything and return to [`SearchStatus::Idle`].
    Reset,
}

/// Everything the consumer sees about the current federated query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSearchState {
    pub query_text: String,
    /// Merged results, always sorted by [`crate::merge::compare_items`].
    pub items: Vec<SearchResultItem>,
    pub status: SearchStatus,
    /// Set only when every source of the last dispatch failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub combined_pagination: CombinedPagination,
    /// Trackers for sources that returned at least one page.
    pub per_source: BTreeMap<String, PerSourcePaginationState>,
    /// Failures of the most recent dispatch, by source id.
    pub source_errors: BTreeMap<String, String>,
    /// Incremented by every new query and reset.
    pub generation: u64,
}

impl AggregateSearchState {
    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.status == SearchStatus::LoadingMore
    }

    /// `true` if a `LoadMoreStarted` event would start a fetch.
    pub fn can_load_more(&self) -> bool {
        self.status == SearchStatus::Ready && self.per_source.values().any(|t| t.has_more_items)
    }

    /// Next-page requests for every source whose tracker reports more items.
    pub fn load_more_requests(&self) -> Vec<SourceRequest> {
        self.per_source
            .values()
            .filter(|t| t.has_more_items)
            .map(|t| t.next_request(&self.query_text))
            .collect()
    }
}

/// Apply one event to the state.
pub fn reduce(state: AggregateSearchState, event: SearchEvent) -> AggregateSearchState {
    match event {
        SearchEvent::QueryStarted { query_text } => AggregateSearchState {
            query_text,
            status: SearchStatus::Loading,
            generation: state.generation + 1,
            ..Default::default()
        },
        SearchEvent::QuerySettled {
            generation,
            outcomes,
        } => {
            if generation != state.generation || state.status != SearchStatus::Loading {
                return state;
            }
            settle_query(state, outcomes)
        }
        SearchEvent::LoadMoreStarted => {
            if !state.can_load_more() {
                return state;
            }
            AggregateSearchState {
                status: SearchStatus::LoadingMore,
                ..state
            }
        }
        SearchEvent::LoadMoreSettled {
            generation,
            outcomes,
        } => {
            if generation != state.generation || state.status != SearchStatus::LoadingMore {
                return state;
            }
            settle_load_more(state, outcomes)
        }
        SearchEvent::Reset => AggregateSearchState {
            generation: state.generation + 1,
            ..Default::default()
        },
    }
}

fn settle_query(state: AggregateSearchState, outcomes: Vec<SourceOutcome>) -> AggregateSearchState {
    let blank_query = state.query_text.trim().is_empty();
    let attempted = outcomes.len();
    let applied = apply_outcomes(state, outcomes);

    let mut next = applied.state;
    next.error = if blank_query {
        None
    } else if attempted == 0 {
        Some("no search sources selected".to_string())
    } else if applied.succeeded == 0 {
        Some(total_failure_message(&next.source_errors))
    } else {
        None
    };
    next
}

fn settle_load_more(
    state: AggregateSearchState,
    outcomes: Vec<SourceOutcome>,
) -> AggregateSearchState {
    let attempted = outcomes.len();
    let applied = apply_outcomes(state, outcomes);

    let mut next = applied.state;
    next.error = if attempted > 0 && applied.succeeded == 0 {
        Some(total_failure_message(&next.source_errors))
    } else {
        None
    };
    next
}

struct Applied {
    state: AggregateSearchState,
    succeeded: usize,
}

/// Merge successful pages, replace their trackers, and record failures.
///
/// Always leaves the state in [`SearchStatus::Ready`] with the combined
/// pagination recomputed.
fn apply_outcomes(mut state: AggregateSearchState, outcomes: Vec<SourceOutcome>) -> Applied {
    let mut succeeded = 0;
    let mut fresh = Vec::new();
    state.source_errors.clear();

    for outcome in outcomes {
        let SourceOutcome { request, result } = outcome;
        match result {
            Ok(page) => {
                succeeded += 1;
                let tracker = PerSourcePaginationState::from_page(
                    &request.target,
                    &request.page,
                    &page.pagination,
                );
                state.per_source.insert(request.target.id.clone(), tracker);
                fresh.extend(tag_page(&request.target, page.items));
            }
            Err(message) => {
                state.source_errors.insert(request.target.id.clone(), message);
            }
        }
    }

    let existing = std::mem::take(&mut state.items);
    state.items = merge_items(existing, fresh);
    state.combined_pagination = combine(&state.per_source, state.items.len() as u64);
    state.status = SearchStatus::Ready;

    Applied { state, succeeded }
}

fn total_failure_message(source_errors: &BTreeMap<String, String>) -> String {
    let details: Vec<String> = source_errors
        .iter()
        .map(|(id, message)| format!("{}: {}", id, message))
        .collect();
    format!(
        "all {} search sources failed ({})",
        source_errors.len(),
        details.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawPagination, RawResultItem, SourceTarget};
    use chrono::{TimeZone, Utc};

    fn target(id: &str) -> SourceTarget {
        SourceTarget::new(id, format!("https://{}", id), id.to_uppercase())
    }

    fn item(id: &str, minute: u32) -> RawResultItem {
        RawResultItem {
            id: id.to_string(),
            name: id.to_string(),
            modified_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap()),
            ..Default::default()
        }
    }

    fn ok(
        req: SourceRequest,
        items: Vec<RawResultItem>,
        has_more: bool,
        total: Option<u64>,
    ) -> SourceOutcome {
        let skip = req.page.skip_count;
        SourceOutcome {
            request: req,
            result: Ok(RawPage {
                pagination: RawPagination {
                    count: Some(items.len() as u64),
                    has_more_items: Some(has_more),
                    total_items: total,
                    skip_count: Some(skip),
                    max_items: None,
                },
                items,
            }),
        }
    }

    fn failed(req: SourceRequest, message: &str) -> SourceOutcome {
        SourceOutcome {
            request: req,
            result: Err(message.to_string()),
        }
    }

    fn first(id: &str, query: &str) -> SourceRequest {
        SourceRequest::first_page(target(id), query, 2)
    }

    fn started(query: &str) -> AggregateSearchState {
        reduce(
            AggregateSearchState::default(),
            SearchEvent::QueryStarted {
                query_text: query.to_string(),
            },
        )
    }

    #[test]
    fn oversized_remote_pagination_settles_normally() {
        let huge = u64::MAX / 2 + 1;
        let s = reduce(
            started("budget"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![
                    ok(first("a", "budget"), vec![item("a1", 1)], true, Some(huge)),
                    ok(first("b", "budget"), vec![item("b1", 2)], true, Some(huge)),
                ],
            },
        );
        assert_eq!(s.status, SearchStatus::Ready);
        assert_eq!(s.generation, 1);
        assert_eq!(s.combined_pagination.total_items, None);
        assert_eq!(s.load_more_requests().len(), 2);
    }

    #[test]
    fn query_started_resets_and_bumps_generation() {
        let s = started("budget");
        assert_eq!(s.status, SearchStatus::Loading);
        assert!(s.is_loading());
        assert_eq!(s.generation, 1);

        let ready = reduce(
            s,
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![ok(first("a", "budget"), vec![item("a1", 1)], true, None)],
            },
        );
        let restarted = reduce(
            ready,
            SearchEvent::QueryStarted {
                query_text: "forecast".to_string(),
            },
        );
        assert_eq!(restarted.generation, 2);
        assert!(restarted.items.is_empty());
        assert!(restarted.per_source.is_empty());
        assert_eq!(restarted.query_text, "forecast");
    }

    #[test]
    fn partial_failure_is_ready_without_error() {
        let s = reduce(
            started("q"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![
                    failed(first("a", "q"), "connection refused"),
                    ok(first("b", "q"), vec![item("b1", 1), item("b2", 2)], false, Some(2)),
                ],
            },
        );
        assert_eq!(s.status, SearchStatus::Ready);
        assert_eq!(s.error, None);
        assert_eq!(s.items.len(), 2);
        assert_eq!(s.per_source.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(s.source_errors.get("a").map(String::as_str), Some("connection refused"));
        assert_eq!(s.combined_pagination.total_items, Some(2));
    }

    #[test]
    fn total_failure_sets_error_and_stays_queryable() {
        let s = reduce(
            started("q"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![failed(first("a", "q"), "timeout"), failed(first("b", "q"), "500")],
            },
        );
        assert_eq!(s.status, SearchStatus::Ready);
        assert!(s.items.is_empty());
        let error = s.error.clone().unwrap();
        assert!(error.contains("a: timeout"));
        assert!(error.contains("b: 500"));
        assert!(!s.combined_pagination.has_more_items);
        assert_eq!(s.combined_pagination.total_items, Some(0));

        let again = reduce(
            s,
            SearchEvent::QueryStarted {
                query_text: "q2".to_string(),
            },
        );
        assert_eq!(again.status, SearchStatus::Loading);
        assert_eq!(again.error, None);
    }

    #[test]
    fn no_sources_is_an_error_but_blank_query_is_not() {
        let s = reduce(
            started("q"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![],
            },
        );
        assert_eq!(s.error.as_deref(), Some("no search sources selected"));

        let blank = reduce(
            started("   "),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![],
            },
        );
        assert_eq!(blank.status, SearchStatus::Ready);
        assert_eq!(blank.error, None);
    }

    #[test]
    fn stale_settle_is_ignored() {
        let first_query = started("x");
        let second_query = reduce(
            first_query,
            SearchEvent::QueryStarted {
                query_text: "y".to_string(),
            },
        );
        let after_stale = reduce(
            second_query.clone(),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![ok(first("a", "x"), vec![item("x1", 1)], false, None)],
            },
        );
        assert_eq!(after_stale, second_query);
    }

    #[test]
    fn load_more_is_noop_unless_ready_with_more() {
        let loading = started("q");
        assert_eq!(reduce(loading.clone(), SearchEvent::LoadMoreStarted), loading);

        let exhausted = reduce(
            loading,
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![ok(first("a", "q"), vec![item("a1", 1)], false, None)],
            },
        );
        assert!(!exhausted.can_load_more());
        assert!(exhausted.load_more_requests().is_empty());
        assert_eq!(reduce(exhausted.clone(), SearchEvent::LoadMoreStarted), exhausted);
    }

    #[test]
    fn load_more_only_targets_sources_with_more() {
        let ready = reduce(
            started("q"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![
                    ok(first("a", "q"), vec![item("a1", 1)], false, Some(1)),
                    ok(first("b", "q"), vec![item("b1", 2), item("b2", 3)], true, Some(4)),
                ],
            },
        );
        let requests = ready.load_more_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target.id, "b");
        assert_eq!(requests[0].page.skip_count, 2);
        assert_eq!(requests[0].page.max_items, 2);
        assert_eq!(requests[0].page.query_text, "q");

        let loading_more = reduce(ready, SearchEvent::LoadMoreStarted);
        assert!(loading_more.is_loading_more());
        assert_eq!(loading_more.items.len(), 3);
        assert_eq!(reduce(loading_more.clone(), SearchEvent::LoadMoreStarted), loading_more);

        let more = reduce(
            loading_more,
            SearchEvent::LoadMoreSettled {
                generation: 1,
                outcomes: vec![ok(
                    requests[0].clone(),
                    vec![item("b3", 59), item("b4", 0)],
                    false,
                    Some(4),
                )],
            },
        );
        assert_eq!(more.status, SearchStatus::Ready);
        let order: Vec<&str> = more.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["b3", "b2", "b1", "a1", "b4"]);
        assert_eq!(more.per_source["b"].skip_count, 2);
        assert!(!more.combined_pagination.has_more_items);
        assert_eq!(more.combined_pagination.total_items, Some(5));
        assert_eq!(more.combined_pagination.count, 5);
    }

    #[test]
    fn failed_load_more_keeps_items_and_tracker() {
        let ready = reduce(
            started("q"),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![ok(first("a", "q"), vec![item("a1", 1)], true, None)],
            },
        );
        let requests = ready.load_more_requests();
        let loading_more = reduce(ready.clone(), SearchEvent::LoadMoreStarted);
        let settled = reduce(
            loading_more,
            SearchEvent::LoadMoreSettled {
                generation: 1,
                outcomes: vec![failed(requests[0].clone(), "timeout")],
            },
        );
        assert_eq!(settled.status, SearchStatus::Ready);
        assert_eq!(settled.items, ready.items);
        assert_eq!(settled.per_source, ready.per_source);
        assert!(settled.error.is_some());
        assert!(settled.can_load_more());
    }

    #[test]
    fn reset_returns_to_idle_and_invalidates_in_flight() {
        let loading = started("q");
        let reset = reduce(loading, SearchEvent::Reset);
        assert_eq!(reset.status, SearchStatus::Idle);
        assert_eq!(reset.generation, 2);

        let late = reduce(
            reset.clone(),
            SearchEvent::QuerySettled {
                generation: 1,
                outcomes: vec![ok(first("a", "q"), vec![item("a1", 1)], false, None)],
            },
        );
        assert_eq!(late, reset);
    }
}
