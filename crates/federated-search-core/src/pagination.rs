//! Per-source pagination trackers and the combined pagination summary.
//!
//! A tracker exists for a source only after that source has returned at
//! least one page for the current query. Its fields are replaced wholesale
//! from each response: the remote source is authoritative for its own
//! `skip_count`, `has_more_items` and `total_items`. When a response omits
//! the window fields, the requested window is used instead.
//!
//! ```text
//!   absent ──first page ok──▶ active ──has_more_items = false──▶ exhausted
//!     │
//!     └──first page failed──▶ absent (not exhausted; simply unknown)
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{PageRequest, RawPagination, SourceRequest, SourceTarget};

/// Last-seen page window and remaining-items signal for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerSourcePaginationState {
    pub source_id: String,
    pub address: String,
    pub display_name: String,
    pub window_size: u64,
    pub skip_count: u64,
    pub has_more_items: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl PerSourcePaginationState {
    /// Build the tracker for `target` from a successful response to `request`.
    pub fn from_page(
        target: &SourceTarget,
        request: &PageRequest,
        pagination: &RawPagination,
    ) -> Self {
        Self {
            source_id: target.id.clone(),
            address: target.address.clone(),
            display_name: target.display_name.clone(),
            window_size: pagination
                .max_items
                .filter(|n| *n > 0)
                .unwrap_or(request.max_items),
            skip_count: pagination.skip_count.unwrap_or(request.skip_count),
            has_more_items: pagination.has_more_items.unwrap_or(false),
            total_items: pagination.total_items,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        !self.has_more_items
    }

    /// The source this tracker belongs to.
    pub fn target(&self) -> SourceTarget {
        SourceTarget::new(&self.source_id, &self.address, &self.display_name)
    }

    /// The next window for this source: `skip_count + window_size`, same size.
    ///
    /// Saturates at `u64::MAX` for sources reporting absurd offsets.
    pub fn next_request(&self, query_text: &str) -> SourceRequest {
        SourceRequest {
            target: self.target(),
            page: PageRequest {
                source_id: self.source_id.clone(),
                address: self.address.clone(),
                query_text: query_text.to_string(),
                max_items: self.window_size,
                skip_count: self.skip_count.saturating_add(self.window_size),
            },
        }
    }
}

/// The single pagination summary shown to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedPagination {
    /// Number of items in the merged list.
    pub count: u64,
    /// `true` if any active source has more items.
    pub has_more_items: bool,
    /// Sum of all totals, or `None` if any active source did not report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    /// Sum of all per-source window sizes.
    pub window_size: u64,
}

impl Default for CombinedPagination {
    fn default() -> Self {
        Self {
            count: 0,
            has_more_items: false,
            total_items: Some(0),
            window_size: 0,
        }
    }
}

/// Compute the combined pagination over all active trackers.
///
/// With no active trackers this yields `has_more_items = false` and
/// `total_items = Some(0)`.
pub fn combine(
    per_source: &BTreeMap<String, PerSourcePaginationState>,
    count: u64,
) -> CombinedPagination {
    let has_more_items = per_source.values().any(|t| t.has_more_items);
    // An overflowing sum is as good as unknown.
    let total_items = per_source
        .values()
        .try_fold(0u64, |acc, t| t.total_items.and_then(|n| acc.checked_add(n)));
    let window_size = per_source
        .values()
        .fold(0u64, |acc, t| acc.saturating_add(t.window_size));

    CombinedPagination {
        count,
        has_more_items,
        total_items,
        window_size,
    }
}
