//! HTTP surface: routes, wire DTOs and error mapping.
//!
//! | Method | Path                        | Handler              |
//! |--------|-----------------------------|----------------------|
//! | POST   | `/convert`                  | [`submit_conversion`]|
//! | POST   | `/convert/pdf-to-images`    | alias of `/convert`  |
//! | GET    | `/tasks/{task_id}`          | [`get_task`]         |
//! | POST   | `/tasks/{task_id}/cancel`   | [`cancel_task`]      |
//! | GET    | `/tasks/{task_id}/download` | [`download_archive`] |
//! | GET    | `/health`                   | [`health`]           |
//!
//! The service is injected through [`AppState`]; handlers never reach for
//! globals.

use crate::config::OutputFormat;
use crate::error::ApiError;
use crate::job::{JobSnapshot, JobStatus};
use crate::pipeline::archive::ARCHIVE_CONTENT_TYPE;
use crate::service::{ConversionService, JobRequest};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversionService>,
}

impl AppState {
    pub fn new(service: Arc<ConversionService>) -> Self {
        Self { service }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

fn default_output_format() -> String {
    "png".to_string()
}

fn default_zip() -> bool {
    true
}

/// Body of `POST /convert`. Accepts camelCase and snake_case field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequestBody {
    #[serde(alias = "input_urls")]
    pub input_urls: Vec<String>,
    #[serde(default = "default_output_format", alias = "output_format")]
    pub output_format: String,
    #[serde(default = "default_zip")]
    pub zip: bool,
}

impl TryFrom<ConvertRequestBody> for JobRequest {
    type Error = ApiError;

    fn try_from(body: ConvertRequestBody) -> Result<Self, Self::Error> {
        let output_format = body
            .output_format
            .parse::<OutputFormat>()
            .map_err(ApiError::InvalidRequest)?;
        Ok(JobRequest {
            input_urls: body.input_urls,
            output_format,
            package_as_archive: body.zip,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub task_id: String,
}

/// Body of `GET /tasks/{task_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub status: String,
    pub total_pages: usize,
    pub completed_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire status; a job that has not started yet is reported as running.
fn wire_status(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending | JobStatus::Running => "running",
        other => other.as_str(),
    }
}

impl From<&JobSnapshot> for TaskStatusResponse {
    fn from(snap: &JobSnapshot) -> Self {
        let download_url = (snap.status == JobStatus::Completed)
            .then(|| format!("/tasks/{}/download", snap.id));
        let error = match snap.status {
            JobStatus::Failed => Some(snap.error.clone().unwrap_or_else(|| "unknown".into())),
            _ => None,
        };
        Self {
            status: wire_status(snap.status).to_string(),
            total_pages: snap.total_pages,
            completed_pages: snap.completed_pages,
            download_url,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub ok: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound { .. } | ApiError::NotReady { .. } => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

/// POST /convert: register a job and return its id without waiting.
///
/// Unreadable bodies are answered like any other invalid request.
pub async fn submit_conversion(
    State(state): State<AppState>,
    body: Result<Json<ConvertRequestBody>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(body) = body?;
    let request = JobRequest::try_from(body)?;
    let id = state.service.submit(request)?;
    Ok(Json(ConvertResponse {
        task_id: id.to_string(),
    }))
}

/// GET /tasks/{task_id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let snapshot = state.service.status(&task_id)?;
    Ok(Json(TaskStatusResponse::from(&snapshot)))
}

/// POST /tasks/{task_id}/cancel: idempotent for known ids.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state.service.cancel(&task_id)?;
    Ok(Json(CancelResponse { ok: true }))
}

/// GET /tasks/{task_id}/download: stream the finished zip.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let archive = state.service.download(&task_id)?;
    let total = archive.len();
    let chunks = chunk_archive(archive, state.service.config().download_chunk_size);
    let body = Body::from_stream(tokio_stream::iter(
        chunks.into_iter().map(Ok::<Bytes, std::io::Error>),
    ));

    let headers = [
        (header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=images-{task_id}.zip"),
        ),
        (header::CONTENT_LENGTH, total.to_string()),
    ];
    Ok((headers, body).into_response())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "jobs": state.service.registry().len() }))
}

/// Zero-copy slices of the archive, `chunk_size` bytes each.
fn chunk_archive(archive: Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..archive.len())
        .step_by(chunk_size)
        .map(|start| archive.slice(start..(start + chunk_size).min(archive.len())))
        .collect()
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/convert", post(submit_conversion))
        .route("/convert/pdf-to-images", post(submit_conversion))
        .route("/tasks/{task_id}", get(get_task))
        .route("/tasks/{task_id}/cancel", post(cancel_task))
        .route("/tasks/{task_id}/download", get(download_archive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
