//! Application-level entry points for federated search.
//!
//! Wires the config into a ready [`SearchSession`] (HTTP source client,
//! dispatcher, history recorder) and implements the `fedsearch search`
//! command: run the query, load up to `pages - 1` more pages, and print the
//! merged feed with its combined pagination.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::history::{HistoryRecorder, NoHistory, SqliteHistory};
use crate::http_source::HttpSourceClient;
use crate::progress::{format_number, ProgressMode};
use crate::session::SearchSession;
use crate::sources::SourceRegistry;
use federated_search_core::state::AggregateSearchState;

/// Options for [`run_search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Explicit source ids; empty means "the selected sources".
    pub sources: Vec<String>,
    /// Total number of pages to fetch per source (at least 1).
    pub pages: u32,
    /// Print the final state as JSON instead of text.
    pub json: bool,
    pub progress: ProgressMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            pages: 1,
            json: false,
            progress: ProgressMode::Off,
        }
    }
}

/// Build a session that talks HTTP to the configured sources.
///
/// When history is enabled but the database cannot be opened, searching
/// still works: the failure is logged and history is disabled for this run.
pub async fn build_session(config: &Config, progress: ProgressMode) -> Result<SearchSession> {
    let client = HttpSourceClient::new(&config.search)?;
    let dispatcher = Dispatcher::new(Arc::new(client), &config.search)
        .with_progress(Arc::from(progress.reporter()));

    let history: Arc<dyn HistoryRecorder> = if config.history.enabled {
        match SqliteHistory::open(&config.history.path).await {
            Ok(history) => Arc::new(history),
            Err(e) => {
                tracing::warn!(error = %e, "search history unavailable; continuing without it");
                Arc::new(NoHistory)
            }
        }
    } else {
        Arc::new(NoHistory)
    };

    Ok(SearchSession::new(dispatcher, history))
}

/// Run a query, then load more pages until `opts.pages` or exhaustion.
pub async fn search_sources(
    session: &SearchSession,
    registry: &SourceRegistry,
    query: &str,
    opts: &SearchOptions,
) -> Result<AggregateSearchState> {
    let targets = registry.resolve(&opts.sources)?;
    if targets.is_empty() && !query.trim().is_empty() {
        bail!("No sources selected. Configure [sources.<id>] or pass --source <id>.");
    }

    let mut state = session.query(query, &targets).await;
    for _ in 1..opts.pages.max(1) {
        if !session.load_more().await {
            break;
        }
        state = session.snapshot();
    }
    Ok(state)
}

/// The `fedsearch search` command.
pub async fn run_search(config: &Config, query: &str, opts: SearchOptions) -> Result<()> {
    let registry = SourceRegistry::from_config(config);
    let session = build_session(config, opts.progress).await?;
    let state = search_sources(&session, &registry, query, &opts).await;
    session.flush_history().await;
    let state = state?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state);
    }

    if let Some(error) = &state.error {
        bail!("{}", error);
    }
    Ok(())
}

fn print_state(state: &AggregateSearchState) {
    if state.items.is_empty() {
        // A total failure is reported by the caller.
        if state.error.is_none() {
            println!("No results.");
        }
        return;
    }

    for (i, item) in state.items.iter().enumerate() {
        let kind = if item.is_folder { "folder" } else { "file" };
        println!("{}. [{}] {} ({})", i + 1, item.source_name, item.name, kind);
        println!(
            "    modified: {} by {}",
            item.modified_at.format("%Y-%m-%d %H:%M"),
            if item.modified_by.is_empty() {
                "(unknown)"
            } else {
                item.modified_by.as_str()
            }
        );
        if !item.path.is_empty() {
            println!("    path: {}", item.path);
        }
        if let Some(ref mime) = item.mime_type {
            println!("    type: {} ({})", item.resource_type, mime);
        }
        println!("    id: {}", item.id);
        println!();
    }

    let pagination = &state.combined_pagination;
    let total = pagination
        .total_items
        .map(format_number)
        .unwrap_or_else(|| "?".to_string());
    println!(
        "Showing {} of {} results{}",
        format_number(pagination.count),
        total,
        if pagination.has_more_items {
            " (more available)"
        } else {
            ""
        }
    );

    for (source, error) in &state.source_errors {
        eprintln!("Warning: source '{}' failed: {}", source, error);
    }
}
