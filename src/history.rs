//! Search history recording.
//!
//! After a non-empty query completes successfully the session notifies a
//! [`HistoryRecorder`] with the query text and result count. The call is
//! fire-and-forget: it runs on a spawned task and its failure is logged and
//! discarded, never surfacing in the aggregate search state.
//!
//! [`SqliteHistory`] stores entries in the `search_history` table created by
//! `fedsearch init`; [`NoHistory`] discards them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// A completed query, as handed to a [`HistoryRecorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub query_text: String,
    pub result_count: usize,
}

/// A stored history row.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub query_text: String,
    pub result_count: i64,
    pub searched_at: DateTime<Utc>,
}

/// Receives completed queries.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;
}

/// Recorder used when history is disabled.
pub struct NoHistory;

#[async_trait]
impl HistoryRecorder for NoHistory {
    async fn record(&self, _entry: &HistoryEntry) -> Result<()> {
        Ok(())
    }
}

/// SQLite-backed history store.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (creating if needed) the history database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self { pool })
    }

    /// The `limit` most recent searches, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, query_text, result_count, searched_at
            FROM search_history
            ORDER BY searched_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let ts: i64 = row.get("searched_at");
                HistoryRecord {
                    id: row.get("id"),
                    query_text: row.get("query_text"),
                    result_count: row.get("result_count"),
                    searched_at: DateTime::from_timestamp(ts, 0).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HistoryRecorder for SqliteHistory {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_history (query_text, result_count, searched_at) VALUES (?, ?, ?)",
        )
        .bind(&entry.query_text)
        .bind(entry.result_count as i64)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Print recent searches (`fedsearch history`).
pub async fn run_history(config: &Config, limit: i64) -> Result<()> {
    if !config.history.enabled {
        println!("History is disabled ([history] enabled = false).");
        return Ok(());
    }

    let history = SqliteHistory::open(&config.history.path).await?;
    let records = history.recent(limit).await?;
    history.close().await;

    if records.is_empty() {
        println!("No searches recorded.");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {:>6} results  {}",
            record.searched_at.format("%Y-%m-%d %H:%M"),
            record.result_count,
            record.query_text
        );
    }
    Ok(())
}
