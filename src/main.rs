//! # Federated Search CLI (`fedsearch`)
//!
//! Runs one query against every selected content-repository source and
//! prints the merged, newest-first result feed.
//!
//! ## Usage
//!
//! ```bash
//! fedsearch --config ./config/fedsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fedsearch init` | Create the history database and run schema migrations |
//! | `fedsearch sources` | List configured sources and whether they are selected |
//! | `fedsearch search "<query>"` | Search all selected sources |
//! | `fedsearch history` | Show recent searches |
//!
//! ## Examples
//!
//! ```bash
//! # Search every selected source
//! fedsearch search "quarterly budget"
//!
//! # Search two specific sources and fetch three pages from each
//! fedsearch search "invoice" --source prod --source archive --pages 3
//!
//! # Machine-readable output
//! fedsearch search "invoice" --json --progress json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use federated_search::progress::ProgressMode;
use federated_search::search::SearchOptions;
use federated_search::{config, history, migrate, search, sources};

/// Federated search over independently paginated repository sources.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fedsearch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fedsearch",
    about = "Federated search over independently paginated content-repository sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fedsearch.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the history database schema.
    ///
    /// Idempotent; running it more than once is safe.
    Init,

    /// List configured sources.
    Sources,

    /// Search the selected sources.
    Search {
        /// The search query string.
        query: String,

        /// Only search these sources (repeatable). Overrides `selected` in the config.
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Number of pages to fetch from each source.
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Print the final search state as JSON.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr: `off`, `human` or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Show recent searches.
    History {
        /// Maximum number of entries to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "federated_search=debug"
    } else {
        "federated_search=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Listing sources works without a config file
    if matches!(cli.command, Commands::Sources) && !cli.config.exists() {
        sources::list_sources(&config::Config::minimal())?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("History database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Search {
            query,
            sources,
            pages,
            json,
            progress,
        } => {
            let opts = SearchOptions {
                sources,
                pages,
                json,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            search::run_search(&cfg, &query, opts).await?;
        }
        Commands::History { limit } => {
            history::run_history(&cfg, limit).await?;
        }
    }

    Ok(())
}
