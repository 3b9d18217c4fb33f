//! Remote source abstraction.
//!
//! The [`SourceClient`] trait is the only way the aggregation engine talks
//! to a remote repository. One client serves every source: the page request
//! carries the source id and address, so a single HTTP client (or a single
//! in-memory fixture) can answer for all of them.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{PageRequest, RawPage};

/// Issues one paginated query against one remote source.
///
/// A returned error means "this source produced nothing for this window".
/// Callers treat it as a per-source failure; it never aborts a federated
/// dispatch on its own.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch the page described by `request`.
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage>;
}
