//! Dashboard status endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::super::AppState;
use super::error_response;

/// Per-queue status counts plus recent failures across all queues.
pub async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.queue_repo.all_queue_stats().unwrap_or_default();

    let mut total_pending = 0u64;
    let mut total_failed = 0u64;
    let mut queues = Vec::new();
    for (queue, s) in &stats {
        total_pending += s.pending;
        total_failed += s.failed;
        queues.push(serde_json::json!({
            "queue": queue,
            "pending": s.pending,
            "processing": s.processing,
            "completed": s.completed,
            "failed": s.failed,
            "skipped": s.skipped,
            "total": s.total(),
        }));
    }
    queues.sort_by(|a, b| a["queue"].as_str().cmp(&b["queue"].as_str()));

    let mut recent_failures = Vec::new();
    for queue in state.dispatcher.registry().queues() {
        for item in state
            .queue_repo
            .recent_failures(queue, 5)
            .unwrap_or_default()
        {
            recent_failures.push(serde_json::json!({
                "id": item.id,
                "queue": item.queue,
                "dedupKey": item.dedup_key,
                "error": item.error_message,
                "attempts": item.attempts,
                "processedAt": item.processed_at.map(|dt| dt.to_rfc3339()),
            }));
        }
    }

    axum::Json(serde_json::json!({
        "success": true,
        "queues": queues,
        "totals": {
            "pending": total_pending,
            "failed": total_failed,
        },
        "recentFailures": recent_failures,
        "knownQueues": state.dispatcher.registry().queues(),
    }))
    .into_response()
}

/// One queue's counts plus its most recent items.
pub async fn api_queue_stats(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> impl IntoResponse {
    if state.dispatcher.registry().get(&queue).is_none() {
        return error_response(StatusCode::NOT_FOUND, &format!("unknown queue '{}'", queue))
            .into_response();
    }

    let stats = state.queue_repo.queue_stats(&queue).unwrap_or_default();
    let recent: Vec<_> = state
        .queue_repo
        .recent_items(&queue, 20)
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            serde_json::json!({
                "id": item.id,
                "status": item.status.as_str(),
                "dedupKey": item.dedup_key,
                "attempts": item.attempts,
                "error": item.error_message,
                "createdAt": item.created_at.to_rfc3339(),
                "scheduledFor": item.scheduled_for.map(|dt| dt.to_rfc3339()),
            })
        })
        .collect();

    axum::Json(serde_json::json!({
        "success": true,
        "queue": queue,
        "stats": stats,
        "recent": recent,
    }))
    .into_response()
}
