//! HTTP and WebSocket front door.
//!
//! - `GET /` reports whether engines are loaded, with per-engine counters
//! - `GET /health` returns `healthy` once engines are loaded, `degraded` before
//! - `GET <ws_path>` upgrades to a streaming recognition session

use crate::session::Session;
use crate::state::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
struct EngineStatus {
    name: String,
    submitted: u64,
    completed: u64,
    failed: u64,
    pending: u64,
}

#[derive(Debug, Serialize)]
struct ServerStatus {
    status: &'static str,
    model_loaded: bool,
    engines: Vec<EngineStatus>,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    engines: Vec<String>,
}

pub fn create_router(state: AppState, ws_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(server_status))
        .route("/health", get(health_check))
        .route(ws_path, get(websocket_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    let engines = state
        .engines
        .get()
        .map(|scheduler| {
            scheduler
                .stats()
                .into_iter()
                .map(|s| EngineStatus {
                    name: s.name,
                    submitted: s.submitted,
                    completed: s.completed,
                    failed: s.failed,
                    pending: s.pending,
                })
                .collect()
        })
        .unwrap_or_default();

    Json(ServerStatus {
        status: "running",
        model_loaded: state.model_loaded(),
        engines,
    })
}

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    match state.engines.get() {
        Some(scheduler) => Json(HealthStatus {
            status: "healthy",
            engines: scheduler
                .engine_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }),
        None => Json(HealthStatus {
            status: "degraded",
            engines: Vec::new(),
        }),
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = state.next_session_id();
    let session = Session::new(id, socket, state.engines.clone(), state.session.clone());
    if let Err(e) = session.run().await {
        tracing::warn!(session = id, "session ended with error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxgate_core::{EnsembleConfig, SessionConfig};
    use voxgate_engine::{EngineWorker, InferenceScheduler, NullEngine};

    fn loaded_state() -> AppState {
        let worker =
            EngineWorker::spawn("fasterWhisper", None, Box::new(NullEngine::new())).unwrap();
        AppState::with_engines(
            SessionConfig::default(),
            InferenceScheduler::new(vec![worker], EnsembleConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_status_before_engines_load() {
        let Json(status) = server_status(State(AppState::new(SessionConfig::default()))).await;
        assert_eq!(status.status, "running");
        assert!(!status.model_loaded);
        assert!(status.engines.is_empty());
    }

    #[tokio::test]
    async fn test_status_lists_engine_counters() {
        let Json(status) = server_status(State(loaded_state())).await;
        assert!(status.model_loaded);
        assert_eq!(status.engines.len(), 1);
        assert_eq!(status.engines[0].name, "fasterWhisper");
        assert_eq!(status.engines[0].submitted, 0);
        assert_eq!(status.engines[0].pending, 0);
    }

    #[tokio::test]
    async fn test_status_serializes_flat_counters() {
        let Json(status) = server_status(State(loaded_state())).await;
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value["engines"][0],
            serde_json::json!({
                "name": "fasterWhisper",
                "submitted": 0,
                "completed": 0,
                "failed": 0,
                "pending": 0
            })
        );
    }

    #[tokio::test]
    async fn test_health_degraded_without_engines() {
        let Json(health) = health_check(State(AppState::new(SessionConfig::default()))).await;
        assert_eq!(health.status, "degraded");
        assert!(health.engines.is_empty());
    }

    #[tokio::test]
    async fn test_health_lists_engine_names() {
        let Json(health) = health_check(State(loaded_state())).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.engines, vec!["fasterWhisper".to_string()]);
    }
}
