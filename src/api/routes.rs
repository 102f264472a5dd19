//! HTTP routes for the crawl API
//!
//! | Method | Path              | Operation |
//! |--------|-------------------|-----------|
//! | GET    | `/`               | Health    |
//! | POST   | `/crawl`          | Submit    |
//! | GET    | `/crawl/:task_id` | Poll      |
//! | GET    | `/tasks`          | List      |

use crate::api::{
    CrawlRequest, CrawlService, ErrorBody, HealthResponse, Submission, TaskListItem, TaskView,
};
use crate::config::ServerConfig;
use crate::LanternError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Error wrapper that renders as `{"detail": ...}` with a matching status
#[derive(Debug)]
pub struct ApiError(pub LanternError);

impl From<LanternError> for ApiError {
    fn from(err: LanternError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            LanternError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
            LanternError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LanternError::Dispatch(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            LanternError::TaskNotFound { .. } => "Task not found".to_string(),
            LanternError::InvalidRequest(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

/// Builds the API router around a shared service
pub fn router(service: Arc<CrawlService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/crawl", post(trigger_crawl))
        .route("/crawl/:task_id", get(get_crawl_status))
        .route("/tasks", get(list_tasks))
        .with_state(service)
}

/// Binds the configured address and serves until Ctrl-C
pub async fn serve(config: &ServerConfig, service: Arc<CrawlService>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health(State(service): State<Arc<CrawlService>>) -> Json<HealthResponse> {
    Json(service.health())
}

async fn trigger_crawl(
    State(service): State<Arc<CrawlService>>,
    Json(request): Json<CrawlRequest>,
) -> Result<Json<Submission>, ApiError> {
    let submission = service
        .submit(&request.keyword, request.engine.as_deref())
        .await?;
    Ok(Json(submission))
}

async fn get_crawl_status(
    State(service): State<Arc<CrawlService>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    Ok(Json(service.poll(&task_id).await?))
}

async fn list_tasks(
    State(service): State<Arc<CrawlService>>,
) -> Result<Json<Vec<TaskListItem>>, ApiError> {
    Ok(Json(service.list().await?))
}
