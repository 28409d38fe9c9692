//! Queue item model - one row of deferred work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a queue item.
///
/// `pending` items are claimable, `processing` is the transient lease
/// state, `completed`/`failed`/`skipped` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Terminal states are never mutated by the dispatcher again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Live states block another row with the same dedup key.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Completed)
    }
}

/// A unit of deferred work in one of the domain queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Opaque unique identifier, assigned at creation.
    pub id: String,
    /// Domain queue name ("albums", "stories", "social").
    pub queue: String,
    pub status: QueueStatus,
    /// Derived identifier preventing duplicate work, see `models::dedup_key`.
    pub dedup_key: String,
    /// Domain payload, opaque to the dispatcher.
    pub payload: serde_json::Value,
    /// Incremented on every claim, never decremented.
    pub attempts: u32,
    /// Last failure reason; overwritten per failure, cleared on success.
    pub error_message: Option<String>,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Item is invisible to the dispatcher until this time passes.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Create a new pending item.
    pub fn new(queue: &str, dedup_key: String, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            queue: queue.to_string(),
            status: QueueStatus::Pending,
            dedup_key,
            payload,
            attempts: 0,
            error_message: None,
            lease_owner: None,
            lease_expires_at: None,
            created_at: Utc::now(),
            scheduled_for: None,
            processed_at: None,
        }
    }

    /// Same as `new` but deferred until `scheduled_for`.
    pub fn new_scheduled(
        queue: &str,
        dedup_key: String,
        payload: serde_json::Value,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        let mut item = Self::new(queue, dedup_key, payload);
        item.scheduled_for = Some(scheduled_for);
        item
    }

    /// Whether the item is visible to the dispatcher at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_for {
            Some(at) => at <= now,
            None => true,
        }
    }
}
