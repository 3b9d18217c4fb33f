//! Core data models for federated search.
//!
//! Two families of types live here:
//!
//! - **Wire types** ([`PageRequest`], [`RawPage`], [`RawResultItem`],
//!   [`RawPagination`]) describe what a remote source receives and returns.
//!   They are deliberately lenient: every field except the item id may be
//!   absent, and timestamps accept several encodings.
//! - **Normalized types** ([`SourceTarget`], [`SearchResultItem`]) are what
//!   the merger and the aggregate state operate on. A [`SearchResultItem`]
//!   always has a concrete `modified_at` and carries the id and display name
//!   of the source it came from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One addressable remote source participating in a federated query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTarget {
    /// Stable identifier, unique among configured sources.
    pub id: String,
    /// Base address of the source's API (e.g. `https://repo.example.com/api`).
    pub address: String,
    /// Human-readable name, copied onto every result from this source.
    pub display_name: String,
}

impl SourceTarget {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}

/// A page window requested from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub source_id: String,
    pub address: String,
    pub query_text: String,
    pub max_items: u64,
    pub skip_count: u64,
}

/// A page request bound to the source it is addressed to.
///
/// The dispatcher needs the full [`SourceTarget`] (not just the address) so
/// that a successful response can seed a pagination tracker and tag items
/// with the source's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub target: SourceTarget,
    pub page: PageRequest,
}

impl SourceRequest {
    /// The first window of a fresh query: `skip_count = 0`, `max_items = window_size`.
    pub fn first_page(target: SourceTarget, query_text: &str, window_size: u64) -> Self {
        let page = PageRequest {
            source_id: target.id.clone(),
            address: target.address.clone(),
            query_text: query_text.to_string(),
            max_items: window_size,
            skip_count: 0,
        };
        Self { target, page }
    }
}

/// Pagination metadata as reported by a remote source. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPagination {
    pub count: Option<u64>,
    pub has_more_items: Option<bool>,
    pub total_items: Option<u64>,
    pub skip_count: Option<u64>,
    pub max_items: Option<u64>,
}

/// One page of results as returned by a remote source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPage {
    pub items: Vec<RawResultItem>,
    pub pagination: RawPagination,
}

/// A single hit as returned by a remote source, before normalization.
///
/// Items with an empty `id` cannot take part in de-duplication and are
/// dropped by [`SearchResultItem::from_raw`] callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawResultItem {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub is_file: bool,
    pub canonical_ref: String,
    pub resource_type: String,
    pub path: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub parent_id: Option<String>,
    pub mime_type: Option<String>,
    pub attributes: BTreeMap<String, Value>,
}

/// A normalized search hit in the combined feed.
///
/// `(source_id, id)` is the de-duplication key and is unique within an
/// aggregate result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub is_file: bool,
    pub canonical_ref: String,
    pub resource_type: String,
    pub path: String,
    /// Last modification time. Absent remote values become the Unix epoch.
    pub modified_at: DateTime<Utc>,
    pub modified_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub attributes: BTreeMap<String, Value>,
    pub source_id: String,
    pub source_name: String,
}

impl SearchResultItem {
    /// Normalize a raw hit and tag it with the source it came from.
    pub fn from_raw(raw: RawResultItem, source: &SourceTarget) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            is_folder: raw.is_folder,
            is_file: raw.is_file,
            canonical_ref: raw.canonical_ref,
            resource_type: raw.resource_type,
            path: raw.path,
            modified_at: raw.modified_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            modified_by: raw.modified_by.unwrap_or_default(),
            created_at: raw.created_at,
            created_by: raw.created_by,
            parent_id: raw.parent_id,
            mime_type: raw.mime_type,
            attributes: raw.attributes,
            source_id: source.id.clone(),
            source_name: source.display_name.clone(),
        }
    }

    /// The `(source_id, id)` de-duplication key.
    pub fn key(&self) -> (&str, &str) {
        (self.source_id.as_str(), self.id.as_str())
    }
}

/// Parse a timestamp in any of the encodings remote sources are known to use.
///
/// Accepts RFC 3339 strings, ISO 8601 strings with a compact offset
/// (`2024-05-01T10:00:00.000+0000`), and integer epoch milliseconds.
/// Anything else yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}
