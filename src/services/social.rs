//! Social posting pipeline.
//!
//! Publishes due posts and, for posts marked recyclable, enqueues the
//! next cycle as a fresh scheduled item. Completed rows are never
//! reopened - each cycle is its own unit of work with a stamped key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::adapters::SocialClient;
use crate::models::{QueueItem, SocialPayload, QUEUE_SOCIAL};
use crate::queue::{enqueue_scheduled, ItemProcessor, ProcessError};
use crate::repository::{ContentRepository, QueueRepository};

pub struct SocialProcessor {
    social: Arc<SocialClient>,
    queue_repo: Arc<QueueRepository>,
    content: Arc<ContentRepository>,
}

impl SocialProcessor {
    pub fn new(
        social: Arc<SocialClient>,
        queue_repo: Arc<QueueRepository>,
        content: Arc<ContentRepository>,
    ) -> Self {
        Self {
            social,
            queue_repo,
            content,
        }
    }

    fn payload(item: &QueueItem) -> Result<SocialPayload, ProcessError> {
        serde_json::from_value(item.payload.clone())
            .map_err(|e| ProcessError::Permanent(format!("malformed payload: {}", e)))
    }
}

#[async_trait]
impl ItemProcessor for SocialProcessor {
    fn queue(&self) -> &'static str {
        QUEUE_SOCIAL
    }

    fn steps(&self) -> &[&'static str] {
        &["publish_post"]
    }

    async fn run_step(
        &self,
        step: &str,
        item: &QueueItem,
        _completed: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ProcessError> {
        let payload = Self::payload(item)?;

        match step {
            "publish_post" => {
                let post_ref = self
                    .social
                    .publish(
                        &payload.message,
                        payload.image_url.as_deref(),
                        payload.source_url.as_deref(),
                    )
                    .await?;
                info!("Published post {} for {}", post_ref, item.dedup_key);

                // Recycling: the finished row stays completed; the next
                // cycle is a new scheduled item with a stamped key.
                let mut recycled_id = None;
                if let Some(days) = payload.recycle_after_days {
                    let next = recycle_payload(&payload);
                    let due = Utc::now() + Duration::days(days as i64);
                    let outcome = enqueue_scheduled(
                        &self.queue_repo,
                        &self.content,
                        QUEUE_SOCIAL,
                        serde_json::to_value(&next)
                            .map_err(|e| ProcessError::Transient(e.to_string()))?,
                        due,
                    )
                    .map_err(|e| ProcessError::Transient(e.to_string()))?;
                    if outcome.was_enqueued() {
                        recycled_id = Some(outcome.item().id.clone());
                    }
                }

                Ok(json!({"post_ref": post_ref, "recycled_item_id": recycled_id}))
            }
            other => Err(ProcessError::Permanent(format!("unknown step '{}'", other))),
        }
    }
}

/// Next-cycle payload: same content, incremented cycle stamp.
fn recycle_payload(payload: &SocialPayload) -> SocialPayload {
    SocialPayload {
        message: payload.message.clone(),
        image_url: payload.image_url.clone(),
        source_url: payload.source_url.clone(),
        recycle_after_days: payload.recycle_after_days,
        cycle: payload.cycle + 1,
    }
}
