//! Result merger: one globally time-ordered feed out of many source pages.
//!
//! # Total Order
//!
//! 1. `modified_at` descending (newest first).
//! 2. `source_id` ascending.
//! 3. `id` ascending.
//!
//! Steps 2 and 3 only break ties, which keeps the order deterministic when
//! two sources report the same timestamp.
//!
//! # Merge Algorithm
//!
//! 1. Tag each fresh item with its source ([`tag_page`]).
//! 2. Union existing and fresh items keyed by `(source_id, id)`; the existing
//!    entry wins.
//! 3. Re-sort the whole union.
//!
//! The full re-sort is required: page windows of different sources are not
//! aligned in time, so a later page from one source can hold items newer
//! than items already shown from another.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{RawResultItem, SearchResultItem, SourceTarget};

/// Compare two items by the total order of the combined feed.
pub fn compare_items(a: &SearchResultItem, b: &SearchResultItem) -> Ordering {
    b.modified_at
        .cmp(&a.modified_at)
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.id.cmp(&b.id))
}

/// Normalize one source's raw page and tag every item with that source.
///
/// Items without an id are dropped: they cannot be de-duplicated.
pub fn tag_page(source: &SourceTarget, items: Vec<RawResultItem>) -> Vec<SearchResultItem> {
    items
        .into_iter()
        .filter(|raw| !raw.id.trim().is_empty())
        .map(|raw| SearchResultItem::from_raw(raw, source))
        .collect()
}

/// Merge fresh items into an existing combined list.
///
/// Returns the de-duplicated union sorted by [`compare_items`]. Existing
/// entries win over incoming ones with the same key, and the first of two
/// incoming duplicates wins over the second. Merging the same batch twice
/// yields the same list.
pub fn merge_items<I>(existing: Vec<SearchResultItem>, incoming: I) -> Vec<SearchResultItem>
where
    I: IntoIterator<Item = SearchResultItem>,
{
    let mut seen: HashSet<(String, String)> = existing
        .iter()
        .map(|item| (item.source_id.clone(), item.id.clone()))
        .collect();

    let mut merged = existing;
    for item in incoming {
        if seen.insert((item.source_id.clone(), item.id.clone())) {
            merged.push(item);
        }
    }

    merged.sort_by(compare_items);
    merged
}

/// Returns `true` if `items` is sorted by the total order and free of duplicate keys.
pub fn is_well_formed(items: &[SearchResultItem]) -> bool {
    let ordered = items
        .windows(2)
        .all(|w| compare_items(&w[0], &w[1]) != Ordering::Greater);
    let mut keys = HashSet::new();
    ordered && items.iter().all(|item| keys.insert(item.key()))
}
