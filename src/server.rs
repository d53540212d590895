//! HTTP API for the task store.
//!
//! Maps verbs and paths onto `TaskStore` operations and store errors onto
//! status codes. No retries happen here.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::store::TaskStore;
use crate::types::{NewTask, Task, TaskId, TaskUpdate};

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.message);
        } else {
            warn!("Request rejected: {}", self.message);
        }
        (status, Json(self)).into_response()
    }
}

/// `GET /tasks`
async fn list_tasks(State(store): State<TaskStore>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(store.list().await?))
}

/// `POST /tasks`
async fn create_task(
    State(store): State<TaskStore>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = store.create(input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /tasks/{task_id}`
async fn update_task(
    State(store): State<TaskStore>,
    Path(task_id): Path<TaskId>,
    Json(changes): Json<TaskUpdate>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(store.update(task_id, changes).await?))
}

/// `DELETE /tasks/{task_id}`
async fn delete_task(
    State(store): State<TaskStore>,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, ApiError> {
    store.delete(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(store: TaskStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{task_id}", put(update_task).delete(delete_task))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn serve_listener<F>(
    listener: tokio::net::TcpListener,
    store: TaskStore,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Task API shutting down");
        })
        .await
}

/// Serve in the foreground until `shutdown` resolves, letting in-flight requests finish.
pub async fn serve<F>(store: TaskStore, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Task API listening on http://{}", listener.local_addr()?);
    serve_listener(listener, store, shutdown).await?;
    Ok(())
}

/// Bind and serve in the background.
///
/// Returns a sender that triggers graceful shutdown and the bound address
/// (useful with port 0).
pub async fn start_server(
    store: TaskStore,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Task API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = serve_listener(listener, store, shutdown).await {
            error!("Task API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
