//! # Federated Search Core
//!
//! Runtime-free logic of the federated search engine: the result model, the
//! merger that keeps one globally time-ordered feed, the per-source
//! pagination trackers, and the pure reducer that drives the aggregate
//! search state.
//!
//! This crate contains no tokio, reqwest, sqlx, or other I/O dependencies.
//! Dispatching requests and per-source timeouts live in the
//! `federated-search` application crate, which feeds the outcomes of each
//! dispatch into [`state::reduce`].

pub mod merge;
pub mod models;
pub mod pagination;
pub mod source;
pub mod state;
