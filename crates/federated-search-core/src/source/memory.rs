//! In-memory [`SourceClient`] implementation for tests and offline use.
//!
//! Each source id maps to a fixed list of items held behind
//! `std::sync::RwLock`. A query matches items whose name or path contains
//! the query text (case-insensitive); the query `*` matches everything.
//! Matching items are paginated in insertion order by `skip_count` and
//! `max_items`, and the response reports `has_more_items` and, unless
//! disabled per source, `total_items`.
//!
//! Sources can be switched into a failing mode to exercise partial-failure
//! handling, and every request is logged for inspection.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::SourceClient;
use crate::models::{PageRequest, RawPage, RawPagination, RawResultItem};

struct MemorySourceData {
    items: Vec<RawResultItem>,
    report_total: bool,
    failure: Option<String>,
}

/// In-memory set of remote sources.
pub struct InMemorySource {
    sources: RwLock<HashMap<String, MemorySourceData>>,
    requests: RwLock<Vec<PageRequest>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Builder-style variant of [`set_items`](Self::set_items).
    pub fn with_items(self, source_id: &str, items: Vec<RawResultItem>) -> Self {
        self.set_items(source_id, items);
        self
    }

    /// Replace the items served for `source_id`, creating the source if needed.
    pub fn set_items(&self, source_id: &str, items: Vec<RawResultItem>) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        sources
            .entry(source_id.to_string())
            .and_modify(|data| data.items = items.clone())
            .or_insert(MemorySourceData {
                items,
                report_total: true,
                failure: None,
            });
    }

    /// Control whether responses for `source_id` include `total_items`.
    pub fn set_report_total(&self, source_id: &str, report_total: bool) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = sources.get_mut(source_id) {
            data.report_total = report_total;
        }
    }

    /// Make every request to `source_id` fail with `message`.
    pub fn fail(&self, source_id: &str, message: &str) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        sources
            .entry(source_id.to_string())
            .or_insert(MemorySourceData {
                items: Vec::new(),
                report_total: true,
                failure: None,
            })
            .failure = Some(message.to_string());
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, source_id: &str) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = sources.get_mut(source_id) {
            data.failure = None;
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(item: &RawResultItem, query: &str) -> bool {
    let query = query.trim();
    if query == "*" {
        return true;
    }
    let needle = query.to_lowercase();
    item.name.to_lowercase().contains(&needle) || item.path.to_lowercase().contains(&needle)
}

#[async_trait]
impl SourceClient for InMemorySource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage> {
        self.requests
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());
        let data = match sources.get(&request.source_id) {
            Some(data) => data,
            None => bail!("unknown source '{}'", request.source_id),
        };
        if let Some(message) = &data.failure {
            bail!("{}", message);
        }

        let matching: Vec<&RawResultItem> = data
            .items
            .iter()
            .filter(|item| matches(item, &request.query_text))
            .collect();
        let total = matching.len() as u64;
        let items: Vec<RawResultItem> = matching
            .into_iter()
            .skip(request.skip_count as usize)
            .take(request.max_items as usize)
            .cloned()
            .collect();

        Ok(RawPage {
            pagination: RawPagination {
                count: Some(items.len() as u64),
                has_more_items: Some(request.skip_count.saturating_add(request.max_items) < total),
                total_items: data.report_total.then_some(total),
                skip_count: Some(request.skip_count),
                max_items: Some(request.max_items),
            },
            items,
        })
    }
}
