//! Claiming and outcome transitions.
//!
//! Claims are atomic conditional updates: a row only moves to
//! `processing` if it is still `pending` at update time, so concurrent
//! dispatchers cannot double-claim. Every outcome write carries the same
//! kind of status guard, which is what keeps terminal rows immutable.

use chrono::{Duration, Utc};
use rusqlite::params;

use super::{row_to_item, QueueRepository};
use crate::models::QueueItem;
use crate::repository::Result;

impl QueueRepository {
    /// Return expired `processing` leases to `pending`.
    ///
    /// Attempts are untouched: the claim that took the lease already
    /// counted. Returns the number of rows reclaimed.
    pub fn release_expired_leases(&self, queue: Option<&str>) -> Result<usize> {
        let conn = self.connect()?;
        let reclaimed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'pending', lease_owner = NULL, lease_expires_at = NULL
            WHERE status = 'processing'
            AND lease_expires_at IS NOT NULL AND lease_expires_at < ?1
            AND (?2 IS NULL OR queue = ?2)
            "#,
            params![Self::now_str(), queue],
        )?;
        Ok(reclaimed)
    }

    /// Fetch claimable candidates: pending, due, oldest first.
    pub fn fetch_candidates(&self, queue: &str, limit: usize) -> Result<Vec<QueueItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM queue_items
            WHERE queue = ? AND status = 'pending'
            AND (scheduled_for IS NULL OR scheduled_for <= ?)
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )?;

        let items = stmt
            .query_map(params![queue, Self::now_str(), limit as i64], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Atomically claim one pending item.
    ///
    /// Increments `attempts` and takes a lease. Returns the claimed row,
    /// or `None` if another dispatcher got there first.
    pub fn try_claim(
        &self,
        id: &str,
        owner: &str,
        lease_secs: u64,
    ) -> Result<Option<QueueItem>> {
        let conn = self.connect()?;
        let expires = (Utc::now() + Duration::seconds(lease_secs as i64)).to_rfc3339();
        let changed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'processing',
                attempts = attempts + 1,
                lease_owner = ?,
                lease_expires_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
            params![owner, expires, id],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    /// Mark a processing item completed; clears the error and the lease.
    pub fn mark_completed(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'completed', error_message = NULL,
                lease_owner = NULL, lease_expires_at = NULL, processed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
            params![Self::now_str(), id],
        )?;
        Ok(changed == 1)
    }

    /// Record a failure and requeue for retry (attempts below ceiling).
    ///
    /// The error stays visible while the item waits so dashboards show
    /// what went wrong last time.
    pub fn mark_retry(&self, id: &str, error: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'pending', error_message = ?,
                lease_owner = NULL, lease_expires_at = NULL
            WHERE id = ? AND status = 'processing'
            "#,
            params![error, id],
        )?;
        Ok(changed == 1)
    }

    /// Mark a processing item permanently failed.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'failed', error_message = ?,
                lease_owner = NULL, lease_expires_at = NULL, processed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
            params![error, Self::now_str(), id],
        )?;
        Ok(changed == 1)
    }

    /// Mark a still-pending candidate skipped (dedup collision).
    pub fn mark_skipped(&self, id: &str, reason: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'skipped', error_message = ?, processed_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
            params![reason, Self::now_str(), id],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QueueStatus, QUEUE_ALBUMS};
    use serde_json::json;
    use tempfile::tempdir;

    fn repo_with_item() -> (QueueRepository, QueueItem, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = QueueRepository::new(&dir.path().join("test.db")).unwrap();
        let item = QueueItem::new(QUEUE_ALBUMS, "k".to_string(), json!({}));
        repo.insert(&item).unwrap();
        (repo, item, dir)
    }

    #[test]
    fn test_claim_increments_attempts_and_leases() {
        let (repo, item, _dir) = repo_with_item();

        let claimed = repo.try_claim(&item.id, "worker-1", 300).unwrap().unwrap();
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.lease_owner.as_deref(), Some("worker-1"));
        assert!(claimed.lease_expires_at.unwrap() > Utc::now());

        // Second claim of the same row loses the race
        assert!(repo.try_claim(&item.id, "worker-2", 300).unwrap().is_none());
    }

    #[test]
    fn test_outcome_writes_require_processing() {
        let (repo, item, _dir) = repo_with_item();

        // Not yet claimed - outcome writes are no-ops
        assert!(!repo.mark_completed(&item.id).unwrap());
        assert!(!repo.mark_failed(&item.id, "boom").unwrap());

        repo.try_claim(&item.id, "w", 300).unwrap().unwrap();
        assert!(repo.mark_completed(&item.id).unwrap());

        // Terminal rows are immutable
        assert!(!repo.mark_failed(&item.id, "boom").unwrap());
        assert!(!repo.mark_retry(&item.id, "boom").unwrap());
        let loaded = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.status, QueueStatus::Completed);
        assert!(loaded.error_message.is_none());
        assert!(loaded.processed_at.is_some());
    }

    #[test]
    fn test_retry_returns_to_pending_with_error() {
        let (repo, item, _dir) = repo_with_item();
        repo.try_claim(&item.id, "w", 300).unwrap().unwrap();
        assert!(repo.mark_retry(&item.id, "HTTP 502").unwrap());

        let loaded = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.status, QueueStatus::Pending);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.error_message.as_deref(), Some("HTTP 502"));
        assert!(loaded.lease_owner.is_none());
    }

    #[test]
    fn test_release_expired_leases() {
        let (repo, item, _dir) = repo_with_item();
        // Zero-second lease expires immediately
        repo.try_claim(&item.id, "w", 0).unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));

        let reclaimed = repo.release_expired_leases(Some(QUEUE_ALBUMS)).unwrap();
        assert_eq!(reclaimed, 1);

        let loaded = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.status, QueueStatus::Pending);
        // The expired claim still counted
        assert_eq!(loaded.attempts, 1);

        // Reclaimed item is claimable again
        let again = repo.try_claim(&item.id, "w2", 300).unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[test]
    fn test_fetch_candidates_order_and_schedule() {
        let (repo, _first, _dir) = repo_with_item();

        let later = Utc::now() + Duration::hours(1);
        let scheduled =
            QueueItem::new_scheduled(QUEUE_ALBUMS, "k2".to_string(), json!({}), later);
        repo.insert(&scheduled).unwrap();

        let mut second = QueueItem::new(QUEUE_ALBUMS, "k3".to_string(), json!({}));
        second.created_at = Utc::now() + Duration::seconds(1);
        repo.insert(&second).unwrap();

        let candidates = repo.fetch_candidates(QUEUE_ALBUMS, 10).unwrap();
        // Scheduled item is invisible; oldest first
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].dedup_key, "k");
        assert_eq!(candidates[1].dedup_key, "k3");

        let limited = repo.fetch_candidates(QUEUE_ALBUMS, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_mark_skipped_only_from_pending() {
        let (repo, item, _dir) = repo_with_item();
        assert!(repo.mark_skipped(&item.id, "duplicate of k").unwrap());
        let loaded = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.status, QueueStatus::Skipped);

        // Already skipped - immutable
        assert!(!repo.mark_skipped(&item.id, "again").unwrap());
    }
}
