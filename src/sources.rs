//! Source registry and status listing.
//!
//! The [`SourceRegistry`] is the read-only list of addressable sources the
//! engine may fan out to. It is built from the `[sources.<id>]` tables of the
//! config; each entry's `selected` flag is the persisted selection state.
//! The registry is read once per dispatch, never mid-flight.
//!
//! Also backs the `fedsearch sources` CLI command.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use federated_search_core::models::SourceTarget;

/// Configuration status of a single source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: String,
    pub display_name: String,
    pub address: String,
    pub selected: bool,
}

struct RegisteredSource {
    target: SourceTarget,
    selected: bool,
}

/// Registry of configured sources, in id order.
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry holding every `[sources.<id>]` entry of the config.
    ///
    /// Sources without a `display_name` are displayed by id.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (id, cfg) in &config.sources {
            let display_name = cfg.display_name.clone().unwrap_or_else(|| id.clone());
            registry.register(
                SourceTarget::new(id.clone(), cfg.address.clone(), display_name),
                cfg.selected,
            );
        }
        registry
    }

    /// Register a source, replacing any existing one with the same id.
    pub fn register(&mut self, target: SourceTarget, selected: bool) {
        self.sources.retain(|s| s.target.id != target.id);
        self.sources.push(RegisteredSource { target, selected });
    }

    /// Find a source by id.
    pub fn find(&self, id: &str) -> Option<&SourceTarget> {
        self.sources
            .iter()
            .find(|s| s.target.id == id)
            .map(|s| &s.target)
    }

    /// The sources currently selected for searching.
    pub fn selected(&self) -> Vec<SourceTarget> {
        self.sources
            .iter()
            .filter(|s| s.selected)
            .map(|s| s.target.clone())
            .collect()
    }

    /// Resolve the dispatch list.
    ///
    /// With no explicit ids this is [`selected`](Self::selected). Explicit ids
    /// override the persisted selection; an unknown id is an error.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<SourceTarget>> {
        if ids.is_empty() {
            return Ok(self.selected());
        }

        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.find(id) {
                Some(target) => {
                    if !targets.iter().any(|t: &SourceTarget| t.id == target.id) {
                        targets.push(target.clone());
                    }
                }
                None => bail!("Unknown source: '{}'. Run `fedsearch sources` to list them.", id),
            }
        }
        Ok(targets)
    }

    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.sources
            .iter()
            .map(|s| SourceStatus {
                id: s.target.id.clone(),
                display_name: s.target.display_name.clone(),
                address: s.target.address.clone(),
                selected: s.selected,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Print the configured sources as a table (`fedsearch sources`).
pub fn list_sources(config: &Config) -> Result<()> {
    let registry = SourceRegistry::from_config(config);
    if registry.is_empty() {
        println!("No sources configured. Add a [sources.<id>] table to the config.");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<9} ADDRESS", "SOURCE", "NAME", "SELECTED");
    for status in registry.statuses() {
        println!(
            "{:<16} {:<24} {:<9} {}",
            status.id,
            status.display_name,
            if status.selected { "yes" } else { "no" },
            status.address
        );
    }
    Ok(())
}
