//! Dispatch progress reporting.
//!
//! Reports observable progress while a federated query fans out, so users
//! see how many sources are queried and which of them have answered.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a dispatch.
#[derive(Clone, Debug)]
pub enum SearchProgressEvent {
    /// A dispatch to `sources` sources has started.
    Dispatching { sources: usize, skip_count: u64 },
    /// One source has settled.
    SourceSettled {
        source: String,
        ok: bool,
        items: usize,
    },
}

/// Reports dispatch progress. Implementations write to stderr (human or JSON).
pub trait SearchProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the dispatcher.
    fn report(&self, event: SearchProgressEvent);
}

/// Human-friendly progress on stderr: "search prod  1,234 items".
pub struct StderrProgress;

impl SearchProgressReporter for StderrProgress {
    fn report(&self, event: SearchProgressEvent) {
        let line = match &event {
            SearchProgressEvent::Dispatching {
                sources,
                skip_count,
            } => {
                if *skip_count == 0 {
                    format!("search  querying {} sources...\n", sources)
                } else {
                    format!("search  loading more from {} sources...\n", sources)
                }
            }
            SearchProgressEvent::SourceSettled { source, ok, items } => {
                if *ok {
                    format!("search {}  {} items\n", source, format_number(*items as u64))
                } else {
                    format!("search {}  failed\n", source)
                }
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SearchProgressReporter for JsonProgress {
    fn report(&self, event: SearchProgressEvent) {
        let obj = match &event {
            SearchProgressEvent::Dispatching {
                sources,
                skip_count,
            } => serde_json::json!({
                "event": "dispatch",
                "sources": sources,
                "skip_count": skip_count
            }),
            SearchProgressEvent::SourceSettled { source, ok, items } => serde_json::json!({
                "event": "source_settled",
                "source": source,
                "ok": ok,
                "items": items
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SearchProgressReporter for NoProgress {
    fn report(&self, _event: SearchProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SearchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}' (expected off, human or json)",
                other
            )),
        }
    }
}
