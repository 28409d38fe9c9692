//! Admin endpoints - the destructive surface.
//!
//! Callers present `Authorization: Bearer <token>`; the token's hash
//! must be on file with the admin role.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{error, info};

use super::super::AppState;
use super::error_response;

/// Extract and verify the bearer token; Err carries the ready response.
fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, axum::Json<serde_json::Value>)> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "missing bearer token",
        ));
    };

    match state.admin_repo.verify_admin(token) {
        Ok(true) => Ok(()),
        Ok(false) => Err(error_response(
            StatusCode::FORBIDDEN,
            "admin role required",
        )),
        Err(e) => {
            error!("Admin token lookup failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "auth check failed",
            ))
        }
    }
}

/// Reset a queue's failed items to pending.
pub async fn admin_retry_failed(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp.into_response();
    }

    match state.queue_repo.retry_failed(&queue) {
        Ok(reset) => {
            info!("Admin reset {} failed items on {}", reset, queue);
            axum::Json(serde_json::json!({"success": true, "reset": reset})).into_response()
        }
        Err(e) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

/// Force-release expired leases on a queue.
pub async fn admin_reclaim(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp.into_response();
    }

    match state.queue_repo.release_expired_leases(Some(&queue)) {
        Ok(reclaimed) => {
            axum::Json(serde_json::json!({"success": true, "reclaimed": reclaimed}))
                .into_response()
        }
        Err(e) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub days: u32,
}

/// Bulk-delete terminal items older than the given age.
pub async fn admin_cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CleanupParams>>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp.into_response();
    }

    let days = body.map(|Json(p)| p.days).unwrap_or(30);
    match state.queue_repo.cleanup_terminal(days) {
        Ok(removed) => {
            info!("Admin cleanup removed {} items older than {}d", removed, days);
            axum::Json(serde_json::json!({"success": true, "removed": removed})).into_response()
        }
        Err(e) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}
