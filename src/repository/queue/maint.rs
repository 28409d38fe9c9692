//! Admin maintenance operations: manual retry and bulk cleanup.

use chrono::{Duration, Utc};
use rusqlite::params;

use super::QueueRepository;
use crate::repository::Result;

impl QueueRepository {
    /// Reset failed items to pending with a fresh attempt budget.
    ///
    /// This is the explicit human re-enqueue behind the admin "retry
    /// failed" action, so attempts restart at zero and the stale error
    /// is cleared. Stuck `processing` rows are handled by lease expiry,
    /// not by this.
    pub fn retry_failed(&self, queue: &str) -> Result<usize> {
        let conn = self.connect()?;
        let reset = conn.execute(
            r#"
            UPDATE queue_items
            SET status = 'pending', attempts = 0, error_message = NULL,
                processed_at = NULL
            WHERE queue = ? AND status = 'failed'
            "#,
            params![queue],
        )?;
        Ok(reset)
    }

    /// Delete terminal items older than `days` plus their ledger rows.
    ///
    /// Returns the number of items removed.
    pub fn cleanup_terminal(&self, days: u32) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(days as i64)).to_rfc3339();
        let conn = self.connect()?;

        conn.execute(
            r#"
            DELETE FROM queue_steps WHERE item_id IN (
                SELECT id FROM queue_items
                WHERE status IN ('completed', 'failed', 'skipped')
                AND COALESCE(processed_at, created_at) < ?
            )
            "#,
            params![cutoff],
        )?;

        let removed = conn.execute(
            r#"
            DELETE FROM queue_items
            WHERE status IN ('completed', 'failed', 'skipped')
            AND COALESCE(processed_at, created_at) < ?
            "#,
            params![cutoff],
        )?;

        Ok(removed)
    }
}
