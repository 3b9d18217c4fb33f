//! # Federated Search
//!
//! Query several independently paginated content-repository sources at once
//! and present their results as one chronologically ordered feed.
//!
//! Each source is asked for a window of results; the windows are tagged with
//! their origin, merged, de-duplicated by `(source, id)` and ordered newest
//! first. Pagination is tracked per source so "load more" asks every source
//! that still has items for its next window, and a combined view (count,
//! has-more, total) is derived from the per-source trackers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │ Registry │──▶│ Dispatcher │──▶│ SourceClient │ × N  (HTTP, concurrent)
//! └──────────┘   └─────┬──────┘   └──────────────┘
//!                      │ outcomes (settle-all)
//!                      ▼
//!               ┌──────────────┐    ┌─────────┐
//!               │ SearchSession│──▶ │ History │  (SQLite, fire-and-forget)
//!               │  reduce()    │    └─────────┘
//!               └──────┬───────┘
//!                      ▼
//!                   CLI / watch
//! ```
//!
//! The pure parts (result model, merge, pagination, state reducer) live in
//! the `federated-search-core` crate; this crate adds I/O around them.
//!
//! ## Quick Start
//!
//! ```bash
//! fedsearch init                          # create the history database
//! fedsearch sources                       # list configured sources
//! fedsearch search "budget" --pages 2     # query, then load one more page
//! fedsearch history                       # recent searches
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`sources`] | Source registry and selection |
//! | [`dispatch`] | Concurrent per-source fan-out with timeouts |
//! | [`http_source`] | HTTP source client |
//! | [`error`] | Source failure types |
//! | [`session`] | Aggregate search state machine |
//! | [`search`] | `fedsearch search` command |
//! | [`history`] | Search history recording |
//! | [`progress`] | Dispatch progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod http_source;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod session;
pub mod sources;
