//! `wax enqueue` - push one item onto a queue.

use std::path::Path;

use chrono::{Duration, Utc};
use console::style;

use crate::config::Settings;
use crate::models::known_queues;
use crate::queue::{enqueue, enqueue_scheduled, EnqueueOutcome};
use crate::repository::{ContentRepository, QueueRepository};

pub async fn run(
    settings: &Settings,
    queue: &str,
    payload: Option<&str>,
    file: Option<&Path>,
    defer_minutes: Option<u64>,
) -> anyhow::Result<()> {
    let raw = match (payload, file) {
        (Some(inline), None) => inline.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        _ => {
            println!(
                "{} Provide the payload with --payload '<json>' or --file <path>",
                style("✗").red()
            );
            return Ok(());
        }
    };

    let payload: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            println!("{} Payload is not valid JSON: {}", style("✗").red(), e);
            return Ok(());
        }
    };

    let db_path = settings.database_path();
    let queue_repo = QueueRepository::new(&db_path)?;
    let content_repo = ContentRepository::new(&db_path)?;

    let outcome = if let Some(minutes) = defer_minutes {
        let due = Utc::now() + Duration::minutes(minutes as i64);
        enqueue_scheduled(&queue_repo, &content_repo, queue, payload, due)
    } else {
        enqueue(&queue_repo, &content_repo, queue, payload)
    };

    match outcome {
        Ok(EnqueueOutcome::Enqueued(item)) => {
            println!(
                "{} Enqueued {} on {} (key {})",
                style("✓").green(),
                item.id,
                queue,
                item.dedup_key
            );
            if let Some(at) = item.scheduled_for {
                println!("  {} Due {}", style("→").dim(), at.format("%Y-%m-%d %H:%M"));
            }
        }
        Ok(EnqueueOutcome::Skipped { item, reason }) => {
            println!(
                "{} Skipped: {} (recorded as {})",
                style("!").yellow(),
                reason,
                item.id
            );
        }
        Err(e) => {
            println!("{} Enqueue failed: {}", style("✗").red(), e);
            println!("  Known queues: {}", known_queues().join(", "));
        }
    }

    Ok(())
}
