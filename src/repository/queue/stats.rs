//! Status counts and dashboard queries.

use std::collections::HashMap;

use rusqlite::params;
use serde::Serialize;

use super::{row_to_item, QueueRepository};
use crate::models::QueueItem;
use crate::repository::Result;

/// Per-queue status breakdown for the admin dashboards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed + self.skipped
    }

    fn from_counts(counts: &HashMap<String, u64>) -> Self {
        Self {
            pending: *counts.get("pending").unwrap_or(&0),
            processing: *counts.get("processing").unwrap_or(&0),
            completed: *counts.get("completed").unwrap_or(&0),
            failed: *counts.get("failed").unwrap_or(&0),
            skipped: *counts.get("skipped").unwrap_or(&0),
        }
    }
}

impl QueueRepository {
    /// Count items by status for one queue.
    pub fn count_by_status(&self, queue: &str) -> Result<HashMap<String, u64>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM queue_items WHERE queue = ? GROUP BY status",
        )?;

        let rows = stmt.query_map(params![queue], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(Into::into)
    }

    /// Stats for one queue.
    pub fn queue_stats(&self, queue: &str) -> Result<QueueStats> {
        Ok(QueueStats::from_counts(&self.count_by_status(queue)?))
    }

    /// Stats for every queue that has rows.
    pub fn all_queue_stats(&self) -> Result<HashMap<String, QueueStats>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT DISTINCT queue FROM queue_items")?;
        let queues = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let mut stats = HashMap::new();
        for queue in queues {
            let s = self.queue_stats(&queue)?;
            stats.insert(queue, s);
        }
        Ok(stats)
    }

    /// Most recent failed items for a queue.
    pub fn recent_failures(&self, queue: &str, limit: usize) -> Result<Vec<QueueItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM queue_items
            WHERE queue = ? AND status = 'failed'
            ORDER BY processed_at DESC
            LIMIT ?
            "#,
        )?;

        let items = stmt
            .query_map(params![queue, limit as i64], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Most recently created items for a queue, any status.
    pub fn recent_items(&self, queue: &str, limit: usize) -> Result<Vec<QueueItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM queue_items
            WHERE queue = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )?;

        let items = stmt
            .query_map(params![queue, limit as i64], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }
}
