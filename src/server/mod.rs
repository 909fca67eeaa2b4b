//! HTTP service exposing the review pipeline.
//!
//! Routes:
//! - `GET  /`                         liveness
//! - `GET  /api/reports`              all reports
//! - `GET  /api/stream`               server-sent log events
//! - `POST /api/analyze/:report_id`   one analyze + draft cycle
//! - `GET  /api/download/:report_id`  latest note as a text attachment

pub mod handlers;
pub mod stream;

use crate::pipeline::Pipeline;
use crate::store::ReportStore;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use stream::LogStream;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single report store, initialized on first access.
    pub store: Arc<Mutex<ReportStore>>,
    /// Pipeline wired to narrate into `logs`.
    pub pipeline: Arc<Pipeline>,
    pub logs: LogStream,
}

impl AppState {
    pub fn new(store: ReportStore, pipeline: Pipeline, logs: LogStream) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            pipeline: Arc::new(pipeline),
            logs,
        }
    }
}

/// Build the Axum router with all routes.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/reports", get(handlers::list_reports))
        .route("/stream", get(handlers::stream_logs))
        .route("/analyze/:report_id", post(handlers::analyze_report))
        .route("/download/:report_id", get(handlers::download_note));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind to `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
