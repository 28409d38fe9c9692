//! Queue repository - the shared work table for every domain queue.

mod claim;
mod maint;
mod stats;
mod steps;

pub use stats::QueueStats;

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::{QueueItem, QueueStatus};

/// SQLite-backed repository for queue items and their step ledger.
pub struct QueueRepository {
    db_path: PathBuf,
}

impl QueueRepository {
    /// Create a new queue repository.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- One row per unit of deferred work, all domains share the table
            CREATE TABLE IF NOT EXISTS queue_items (
                id TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                dedup_key TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',

                -- Retry tracking
                attempts INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,

                -- Lease held while processing
                lease_owner TEXT,
                lease_expires_at TEXT,

                -- Timing
                created_at TEXT NOT NULL,
                scheduled_for TEXT,
                processed_at TEXT
            );

            -- Per-item step ledger for multi-step pipelines
            CREATE TABLE IF NOT EXISTS queue_steps (
                item_id TEXT NOT NULL,
                step TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                error TEXT,
                finished_at TEXT NOT NULL,
                PRIMARY KEY (item_id, step)
            );

            CREATE INDEX IF NOT EXISTS idx_queue_items_queue_status
                ON queue_items(queue, status);
            CREATE INDEX IF NOT EXISTS idx_queue_items_dedup
                ON queue_items(dedup_key);
            CREATE INDEX IF NOT EXISTS idx_queue_items_lease
                ON queue_items(lease_expires_at) WHERE status = 'processing';
            CREATE INDEX IF NOT EXISTS idx_queue_items_created
                ON queue_items(created_at);
        "#,
        )?;
        Ok(())
    }

    /// Insert a new item.
    pub fn insert(&self, item: &QueueItem) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO queue_items
                (id, queue, status, dedup_key, payload, attempts, error_message,
                 lease_owner, lease_expires_at, created_at, scheduled_for, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                item.id,
                item.queue,
                item.status.as_str(),
                item.dedup_key,
                item.payload.to_string(),
                item.attempts,
                item.error_message,
                item.lease_owner,
                item.lease_expires_at.map(|dt| dt.to_rfc3339()),
                item.created_at.to_rfc3339(),
                item.scheduled_for.map(|dt| dt.to_rfc3339()),
                item.processed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get an item by ID.
    pub fn get(&self, id: &str) -> Result<Option<QueueItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM queue_items WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_item))
    }

    /// Check whether a live row (pending/processing/completed) holds this
    /// dedup key, excluding a given item id.
    pub fn live_key_exists(
        &self,
        queue: &str,
        dedup_key: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM queue_items
            WHERE queue = ? AND dedup_key = ?
            AND status IN ('pending', 'processing', 'completed')
            AND (?3 IS NULL OR id != ?3)
            "#,
            params![queue, dedup_key, exclude_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn now_str() -> String {
        Utc::now().to_rfc3339()
    }
}

/// Parse a database row into a QueueItem.
pub(crate) fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<QueueItem> {
    let payload_str: String = row.get("payload")?;

    Ok(QueueItem {
        id: row.get("id")?,
        queue: row.get("queue")?,
        status: QueueStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(QueueStatus::Pending),
        dedup_key: row.get("dedup_key")?,
        payload: serde_json::from_str(&payload_str).unwrap_or_default(),
        attempts: row.get::<_, i64>("attempts")? as u32,
        error_message: row.get("error_message")?,
        lease_owner: row.get("lease_owner")?,
        lease_expires_at: parse_datetime_opt(row.get::<_, Option<String>>("lease_expires_at")?),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        scheduled_for: parse_datetime_opt(row.get::<_, Option<String>>("scheduled_for")?),
        processed_at: parse_datetime_opt(row.get::<_, Option<String>>("processed_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QUEUE_ALBUMS;
    use serde_json::json;
    use tempfile::tempdir;

    fn test_repo() -> (QueueRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = QueueRepository::new(&dir.path().join("test.db")).unwrap();
        (repo, dir)
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let (repo, _dir) = test_repo();
        let item = QueueItem::new(
            QUEUE_ALBUMS,
            "miles davis::kind of blue".to_string(),
            json!({"artist": "Miles Davis", "title": "Kind of Blue"}),
        );
        repo.insert(&item).unwrap();

        let loaded = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.id, item.id);
        assert_eq!(loaded.queue, QUEUE_ALBUMS);
        assert_eq!(loaded.status, QueueStatus::Pending);
        assert_eq!(loaded.dedup_key, item.dedup_key);
        assert_eq!(loaded.payload["artist"], "Miles Davis");
        assert_eq!(loaded.attempts, 0);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (repo, _dir) = test_repo();
        assert!(repo.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_live_key_exists_scopes() {
        let (repo, _dir) = test_repo();
        let mut item = QueueItem::new(QUEUE_ALBUMS, "k1".to_string(), json!({}));
        repo.insert(&item).unwrap();

        assert!(repo.live_key_exists(QUEUE_ALBUMS, "k1", None).unwrap());
        // Excluded by id
        assert!(!repo
            .live_key_exists(QUEUE_ALBUMS, "k1", Some(&item.id))
            .unwrap());
        // Different queue
        assert!(!repo.live_key_exists("stories", "k1", None).unwrap());

        // Failed rows do not hold the key
        item.id = uuid::Uuid::new_v4().to_string();
        item.status = crate::models::QueueStatus::Failed;
        item.dedup_key = "k2".to_string();
        repo.insert(&item).unwrap();
        assert!(!repo.live_key_exists(QUEUE_ALBUMS, "k2", None).unwrap());
    }
}
