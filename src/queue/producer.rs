//! Enqueue path shared by the HTTP surface, the CLI and the processors
//! themselves (social recycling).
//!
//! Dedup is enforced here: a payload whose key is already held by
//! generated content or by a live queue row is recorded as `skipped`
//! instead of producing a second live item. If the dedup check itself
//! fails, nothing is inserted - skipping work beats duplicating it.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{dedup_key, validate_payload, QueueItem, QueueStatus};
use crate::repository::{ContentRepository, QueueRepository, Result};

/// Result of an enqueue request.
#[derive(Debug)]
pub enum EnqueueOutcome {
    Enqueued(QueueItem),
    /// A skipped row was recorded for audit; no live work was created.
    Skipped { item: QueueItem, reason: String },
}

impl EnqueueOutcome {
    pub fn item(&self) -> &QueueItem {
        match self {
            Self::Enqueued(item) => item,
            Self::Skipped { item, .. } => item,
        }
    }

    pub fn was_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued(_))
    }
}

/// Validate, dedup and insert a new item.
pub fn enqueue(
    repo: &QueueRepository,
    content: &ContentRepository,
    queue: &str,
    payload: serde_json::Value,
) -> Result<EnqueueOutcome> {
    enqueue_inner(repo, content, queue, payload, None)
}

/// Same as `enqueue`, deferred until `scheduled_for`.
pub fn enqueue_scheduled(
    repo: &QueueRepository,
    content: &ContentRepository,
    queue: &str,
    payload: serde_json::Value,
    scheduled_for: DateTime<Utc>,
) -> Result<EnqueueOutcome> {
    enqueue_inner(repo, content, queue, payload, Some(scheduled_for))
}

fn enqueue_inner(
    repo: &QueueRepository,
    content: &ContentRepository,
    queue: &str,
    payload: serde_json::Value,
    scheduled_for: Option<DateTime<Utc>>,
) -> Result<EnqueueOutcome> {
    validate_payload(queue, &payload)?;
    let key = dedup_key(queue, &payload)?;

    // Dedup against generated content and live queue rows. A failure
    // here propagates before anything is inserted.
    let duplicate = content.has_key(&key)? || repo.live_key_exists(queue, &key, None)?;

    let mut item = match scheduled_for {
        Some(at) => QueueItem::new_scheduled(queue, key.clone(), payload, at),
        None => QueueItem::new(queue, key.clone(), payload),
    };

    if duplicate {
        let reason = format!("duplicate of existing work for key '{}'", key);
        item.status = QueueStatus::Skipped;
        item.error_message = Some(reason.clone());
        item.processed_at = Some(Utc::now());
        repo.insert(&item)?;
        info!("Skipped duplicate enqueue on {}: {}", queue, key);
        return Ok(EnqueueOutcome::Skipped { item, reason });
    }

    repo.insert(&item)?;
    Ok(EnqueueOutcome::Enqueued(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QUEUE_ALBUMS, QUEUE_STORIES};
    use crate::repository::Story;
    use serde_json::json;
    use tempfile::tempdir;

    fn repos() -> (QueueRepository, ContentRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = dir.path().join("test.db");
        (
            QueueRepository::new(&db).unwrap(),
            ContentRepository::new(&db).unwrap(),
            dir,
        )
    }

    #[test]
    fn test_enqueue_then_duplicate_is_skipped() {
        let (repo, content, _dir) = repos();
        let payload = json!({"artist": "Neu!", "title": "Neu! 75"});

        let first = enqueue(&repo, &content, QUEUE_ALBUMS, payload.clone()).unwrap();
        assert!(first.was_enqueued());

        let second = enqueue(&repo, &content, QUEUE_ALBUMS, payload).unwrap();
        assert!(!second.was_enqueued());
        assert_eq!(second.item().status, QueueStatus::Skipped);

        // Exactly one live row for the key
        let stats = repo.queue_stats(QUEUE_ALBUMS).unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_enqueue_blocked_by_existing_content() {
        let (repo, content, _dir) = repos();
        content
            .save_story(&Story::new("neu!::neu! 75", "Neu!", "Neu! 75", "x".to_string()))
            .unwrap();

        let outcome = enqueue(
            &repo,
            &content,
            QUEUE_STORIES,
            json!({"artist": "Neu!", "title": "Neu! 75"}),
        )
        .unwrap();
        assert!(!outcome.was_enqueued());
    }

    #[test]
    fn test_enqueue_rejects_invalid_payload() {
        let (repo, content, _dir) = repos();
        let err = enqueue(&repo, &content, QUEUE_ALBUMS, json!({"artist": "Neu!"})).unwrap_err();
        assert!(err.to_string().contains("malformed payload"));

        // Nothing was inserted
        assert_eq!(repo.queue_stats(QUEUE_ALBUMS).unwrap().total(), 0);
    }

    #[test]
    fn test_failed_row_does_not_block_reenqueue() {
        let (repo, content, _dir) = repos();
        let payload = json!({"artist": "Can", "title": "Ege Bamyasi"});

        let first = enqueue(&repo, &content, QUEUE_ALBUMS, payload.clone()).unwrap();
        let id = first.item().id.clone();
        repo.try_claim(&id, "w", 300).unwrap().unwrap();
        repo.mark_failed(&id, "upstream dead").unwrap();

        let second = enqueue(&repo, &content, QUEUE_ALBUMS, payload).unwrap();
        assert!(second.was_enqueued());
    }
}
