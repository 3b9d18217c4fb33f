//! Per-source failure taxonomy.
//!
//! Every way a single source can fail to produce a page. These errors are
//! absorbed by the dispatcher: their display string becomes the entry in
//! `source_errors` and, when every source fails, part of the aggregate
//! `error` message. They never abort a dispatch.
//!
//! `Client` is the exception: it is raised once, when the HTTP client is
//! built, and stops the command before any source is queried.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl SourceError {
    /// Whether a retry may succeed: rate limiting, server errors, and network failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Timeout { .. } | SourceError::Decode { .. } | SourceError::Client(_) => {
                false
            }
        }
    }
}
