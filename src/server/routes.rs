//! Router configuration for the batch API server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check for the scheduler/orchestrator
        .route("/health", get(handlers::health))
        // Queue processing and producers (trusted-scheduler surface)
        .route("/api/queues/:queue/process", post(handlers::process_queue))
        .route("/api/queues/:queue/items", post(handlers::enqueue_item))
        // Dashboard polling surface
        .route("/api/status", get(handlers::api_status))
        .route("/api/queues/:queue/stats", get(handlers::api_queue_stats))
        // Admin surface (bearer + is_admin)
        .route(
            "/api/admin/queues/:queue/retry-failed",
            post(handlers::admin_retry_failed),
        )
        .route(
            "/api/admin/queues/:queue/reclaim",
            post(handlers::admin_reclaim),
        )
        .route("/api/admin/cleanup", post(handlers::admin_cleanup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
