//! HTTP handlers for the review service.

use crate::models::Report;
use crate::pipeline::progress::{ProgressSink, Style};
use crate::pipeline::PipelineError;
use crate::server::stream::HEARTBEAT_INTERVAL;
use crate::server::AppState;
use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, info};

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Processing of {id} failed: {source}")]
    Processing {
        id: String,
        #[source]
        source: PipelineError,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Report not found" })),
            )
                .into_response(),
            ApiError::Processing { id, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": source.to_string(),
                    "status": "Failed",
                    "id": id,
                })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": format!("{:#}", e) })),
                )
                    .into_response()
            }
        }
    }
}

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: "Clinical AI Agent Backend is Running",
    })
}

/// GET /api/reports
pub async fn list_reports(State(state): State<AppState>) -> Json<Vec<Report>> {
    let mut store = state.store.lock().await;
    store.ensure_initialized();
    Json(store.reports().to_vec())
}

/// GET /api/stream
pub async fn stream_logs(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(state.logs, |logs| async move {
        let event = match logs.next_event(HEARTBEAT_INTERVAL).await {
            Some(entry) => Event::default()
                .event("log")
                .data(serde_json::to_string(&entry).unwrap_or_default()),
            None => Event::default().event("ping").data("keep-alive"),
        };
        Some((Ok::<_, Infallible>(event), logs))
    });

    Sse::new(events)
}

/// POST /api/analyze/:report_id
///
/// Runs one analyze + draft cycle. The store lock is released while the
/// model is consulted.
pub async fn analyze_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report = find_report(&state, &report_id).await?;
    info!("Analysis requested for {}", report.id);

    let analysis = state.pipeline.analyze(&report).await;

    if let Err(source) = state.pipeline.draft(&report, &analysis).await {
        error!("{}", source);
        state
            .logs
            .emit(&format!("CRITICAL ERROR: {}", source), Style::Error);
        return Err(ApiError::Processing {
            id: report_id,
            source,
        });
    }

    let mut store = state.store.lock().await;
    let updated = store
        .mark_processed(&report_id, &analysis)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(report_id.clone()))?;

    Ok(Json(updated))
}

/// GET /api/download/:report_id
///
/// Serves the newest note for the report's patient, writing a placeholder
/// note first if none exists.
pub async fn download_note(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = find_report(&state, &report_id).await?;
    let composer = state.pipeline.composer().clone();
    let lookup = report.clone();

    let path = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        match composer.latest_for(&lookup.patient_name)? {
            Some(path) => Ok(path),
            None => {
                info!("No note on disk for {}, writing placeholder", lookup.id);
                composer.persist(&composer.compose_placeholder(&lookup))
            }
        }
    })
    .await
    .context("Note lookup task failed")??;

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read note {}", path.display()))?;

    let disposition = format!(
        "attachment; filename=\"Medical_Report_{}.txt\"",
        report.file_safe_name()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    ))
}

async fn find_report(state: &AppState, report_id: &str) -> Result<Report, ApiError> {
    let mut store = state.store.lock().await;
    store.ensure_initialized();
    store
        .get(report_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(report_id.to_string()))
}
