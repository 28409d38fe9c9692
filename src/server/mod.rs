//! HTTP server exposing the batch processors, producers and admin
//! operations that the platform's scheduler and dashboards call.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{Config, Settings};
use crate::queue::Dispatcher;
use crate::repository::{AdminRepository, ContentRepository, QueueRepository};
use crate::services;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub queue_repo: Arc<QueueRepository>,
    pub content_repo: Arc<ContentRepository>,
    pub admin_repo: Arc<AdminRepository>,
}

impl AppState {
    pub async fn new(settings: &Settings, config: &Config) -> anyhow::Result<Self> {
        let db_path = settings.database_path();
        let queue_repo = Arc::new(QueueRepository::new(&db_path)?);
        let content_repo = Arc::new(ContentRepository::new(&db_path)?);
        let admin_repo = Arc::new(AdminRepository::new(&db_path)?);

        let registry = services::build_registry(config, queue_repo.clone(), content_repo.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            queue_repo.clone(),
            content_repo.clone(),
            registry,
            config.engine.clone(),
        ));

        Ok(Self {
            dispatcher,
            queue_repo,
            content_repo,
            admin_repo,
        })
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, config: &Config, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(settings, config).await?;
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting batch API server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::config::EngineConfig;
    use crate::models::{QueueItem, QUEUE_ALBUMS};
    use crate::queue::{ItemProcessor, ProcessError, ProcessorRegistry};
    use async_trait::async_trait;

    /// Processor that succeeds unless the payload says otherwise.
    struct EchoProcessor;

    #[async_trait]
    impl ItemProcessor for EchoProcessor {
        fn queue(&self) -> &'static str {
            QUEUE_ALBUMS
        }

        fn steps(&self) -> &[&'static str] {
            &["work"]
        }

        async fn run_step(
            &self,
            _step: &str,
            item: &QueueItem,
            _completed: &HashMap<String, serde_json::Value>,
        ) -> Result<serde_json::Value, ProcessError> {
            if item.payload.get("fail").is_some() {
                return Err(ProcessError::Transient("scripted failure".to_string()));
            }
            Ok(serde_json::json!({"ok": true}))
        }
    }

    fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let queue_repo = Arc::new(QueueRepository::new(&db_path).unwrap());
        let content_repo = Arc::new(ContentRepository::new(&db_path).unwrap());
        let admin_repo = Arc::new(AdminRepository::new(&db_path).unwrap());

        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(EchoProcessor));

        let engine = EngineConfig {
            step_delay_ms: 0,
            ..Default::default()
        };
        let dispatcher = Arc::new(Dispatcher::new(
            queue_repo.clone(),
            content_repo.clone(),
            registry,
            engine,
        ));

        let state = AppState {
            dispatcher,
            queue_repo,
            content_repo,
            admin_repo,
        };

        let app = create_router(state.clone());
        (app, state, dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_enqueue_then_process() {
        let (app, _state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/queues/albums/items",
                serde_json::json!({"artist": "Faust", "title": "IV"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["enqueued"], true);
        assert_eq!(json["status"], "pending");

        let response = app
            .oneshot(post_json(
                "/api/queues/albums/process",
                serde_json::json!({"batchSize": 5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["successful"], 1);
        assert!(json["executionTimeMs"].is_u64());
        assert_eq!(json["results"][0]["success"], true);
    }

    #[tokio::test]
    async fn test_process_without_body() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/queues/albums/process")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["processed"], 0);
    }

    #[tokio::test]
    async fn test_process_unknown_queue() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(post_json(
                "/api/queues/quizzes/process",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_reports_skipped() {
        let (app, _state, _dir) = setup_test_app();
        let payload = serde_json::json!({"artist": "Faust", "title": "IV"});

        let first = app
            .clone()
            .oneshot(post_json("/api/queues/albums/items", payload.clone()))
            .await
            .unwrap();
        assert_eq!(body_json(first).await["enqueued"], true);

        let second = app
            .oneshot(post_json("/api/queues/albums/items", payload))
            .await
            .unwrap();
        let json = body_json(second).await;
        assert_eq!(json["enqueued"], false);
        assert_eq!(json["status"], "skipped");
    }

    #[tokio::test]
    async fn test_enqueue_invalid_payload_rejected() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(post_json(
                "/api/queues/albums/items",
                serde_json::json!({"artist": "Faust"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_api_status_shape() {
        let (app, state, _dir) = setup_test_app();
        state
            .queue_repo
            .insert(&QueueItem::new(
                QUEUE_ALBUMS,
                "x".to_string(),
                serde_json::json!({}),
            ))
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["totals"]["pending"], 1);
        assert_eq!(json["queues"][0]["queue"], "albums");
    }

    #[tokio::test]
    async fn test_queue_stats_endpoint() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/queues/albums/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["queue"], "albums");
        assert!(json["recent"].is_array());
    }

    #[tokio::test]
    async fn test_admin_requires_bearer() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(post_json(
                "/api/admin/queues/albums/retry-failed",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_rejects_non_admin_token() {
        let (app, state, _dir) = setup_test_app();
        let token = state.admin_repo.create_token("viewer", false).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/admin/queues/albums/retry-failed")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_retry_failed_resets() {
        let (app, state, _dir) = setup_test_app();
        let token = state.admin_repo.create_token("ops", true).unwrap();

        // Seed one failed item
        let item = QueueItem::new(QUEUE_ALBUMS, "f".to_string(), serde_json::json!({}));
        state.queue_repo.insert(&item).unwrap();
        state.queue_repo.try_claim(&item.id, "w", 300).unwrap();
        state.queue_repo.mark_failed(&item.id, "boom").unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/admin/queues/albums/retry-failed")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["reset"], 1);
    }

    #[tokio::test]
    async fn test_admin_cleanup_with_days() {
        let (app, state, _dir) = setup_test_app();
        let token = state.admin_repo.create_token("ops", true).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/cleanup")
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"days": 7}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["removed"], 0);
    }
}
