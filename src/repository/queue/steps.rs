//! Step ledger persistence.

use std::collections::HashMap;

use rusqlite::params;

use super::QueueRepository;
use crate::models::{StepRecord, StepStatus};
use crate::repository::{parse_datetime, Result};

impl QueueRepository {
    /// Record a step outcome, replacing any earlier attempt of the same step.
    pub fn record_step(&self, record: &StepRecord) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO queue_steps
                (item_id, step, status, result, error, finished_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.item_id,
                record.step,
                record.status.as_str(),
                record.result.as_ref().map(|v| v.to_string()),
                record.error,
                record.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Results of steps already completed for an item, keyed by step name.
    ///
    /// A retried item consults this to resume after its last finished
    /// step instead of repeating external side effects.
    pub fn completed_steps(&self, item_id: &str) -> Result<HashMap<String, serde_json::Value>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT step, result FROM queue_steps WHERE item_id = ? AND status = 'completed'",
        )?;

        let rows = stmt.query_map(params![item_id], |row| {
            let step: String = row.get(0)?;
            let result: Option<String> = row.get(1)?;
            Ok((step, result))
        })?;

        let mut steps = HashMap::new();
        for row in rows {
            let (step, result) = row?;
            let value = result
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(serde_json::Value::Null);
            steps.insert(step, value);
        }
        Ok(steps)
    }

    /// Full ledger for an item, in finish order.
    pub fn steps_for(&self, item_id: &str) -> Result<Vec<StepRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM queue_steps WHERE item_id = ? ORDER BY finished_at ASC",
        )?;

        let records = stmt
            .query_map(params![item_id], |row| {
                Ok(StepRecord {
                    item_id: row.get("item_id")?,
                    step: row.get("step")?,
                    status: StepStatus::from_str(&row.get::<_, String>("status")?)
                        .unwrap_or(StepStatus::Failed),
                    result: row
                        .get::<_, Option<String>>("result")?
                        .and_then(|s| serde_json::from_str(&s).ok()),
                    error: row.get("error")?,
                    finished_at: parse_datetime(&row.get::<_, String>("finished_at")?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_ledger_roundtrip_and_resume_view() {
        let dir = tempdir().unwrap();
        let repo = QueueRepository::new(&dir.path().join("test.db")).unwrap();

        repo.record_step(&StepRecord::completed(
            "item-1",
            "generate_story",
            json!({"story_id": "s-1"}),
        ))
        .unwrap();
        repo.record_step(&StepRecord::failed("item-1", "create_listing", "HTTP 500"))
            .unwrap();

        let completed = repo.completed_steps("item-1").unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed["generate_story"]["story_id"], "s-1");

        // Retry succeeds: the failed row is replaced
        repo.record_step(&StepRecord::completed(
            "item-1",
            "create_listing",
            json!({"listing_id": "l-1"}),
        ))
        .unwrap();

        let completed = repo.completed_steps("item-1").unwrap();
        assert_eq!(completed.len(), 2);

        let all = repo.steps_for("item-1").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.status == StepStatus::Completed));
    }

    #[test]
    fn test_ledger_scoped_per_item() {
        let dir = tempdir().unwrap();
        let repo = QueueRepository::new(&dir.path().join("test.db")).unwrap();

        repo.record_step(&StepRecord::completed("a", "step", json!(1)))
            .unwrap();
        assert!(repo.completed_steps("b").unwrap().is_empty());
    }
}
