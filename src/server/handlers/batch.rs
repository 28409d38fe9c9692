//! Batch processing and enqueue endpoints.
//!
//! These carry no authentication: they are invoked by the platform's
//! scheduler or the admin UI, never exposed publicly. Destructive
//! operations live under /api/admin with bearer auth instead.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::error;

use super::super::AppState;
use super::error_response;
use crate::queue::{enqueue, BatchOptions, DispatchError};

/// Body for the process endpoint; dashboards send `batchSize`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessParams {
    pub batch_size: Option<usize>,
}

/// Run one dispatcher batch on a queue.
pub async fn process_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    body: Option<Json<ProcessParams>>,
) -> impl IntoResponse {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let opts = BatchOptions {
        batch_size: params.batch_size,
    };

    match state.dispatcher.run_batch(&queue, &opts).await {
        Ok(summary) => {
            let mut value = serde_json::to_value(&summary).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert("success".to_string(), serde_json::Value::Bool(true));
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(DispatchError::UnknownQueue(name)) => {
            error_response(StatusCode::NOT_FOUND, &format!("unknown queue '{}'", name))
                .into_response()
        }
        Err(e) => {
            error!("Batch on {} failed: {}", queue, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

/// Enqueue one item through validation and dedup.
pub async fn enqueue_item(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match enqueue(&state.queue_repo, &state.content_repo, &queue, payload) {
        Ok(outcome) => {
            let item = outcome.item();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "enqueued": outcome.was_enqueued(),
                    "id": item.id,
                    "dedupKey": item.dedup_key,
                    "status": item.status.as_str(),
                })),
            )
                .into_response()
        }
        Err(crate::repository::RepositoryError::Payload(e)) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        Err(e) => {
            error!("Enqueue on {} failed: {}", queue, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}
