//! HTTP endpoint handlers.

mod admin;
mod batch;
mod stats;

pub use admin::{admin_cleanup, admin_reclaim, admin_retry_failed};
pub use batch::{enqueue_item, process_queue};
pub use stats::{api_queue_stats, api_status};

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Standard failure envelope.
pub(crate) fn error_response(
    status: StatusCode,
    message: &str,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        status,
        axum::Json(serde_json::json!({
            "success": false,
            "error": message,
        })),
    )
}
