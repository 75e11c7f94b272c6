//! HTTP surface
//!
//! - `GET /metrics`: Prometheus text exposition of the current snapshot
//! - `POST /-/reload`: re-read the configuration file
//! - `GET /health`: JSON self-status of the exporter

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, error, info};

use crate::config::ConfigHandle;
use crate::exporter;
use crate::health::{ExporterHealth, HealthTracker};
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub config: ConfigHandle,
    pub health: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/-/reload", post(reload))
        .route("/health", get(health))
        .with_state(app_state)
}

// GET /metrics
async fn metrics(State(app): State<AppState>) -> Response {
    let snapshot = app.scheduler.snapshot_for_scrape().await;
    debug!(cycle = %snapshot.cycle_id, samples = snapshot.sample_count(), "serving scrape");
    match exporter::render(snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// POST /-/reload
async fn reload(State(app): State<AppState>) -> (StatusCode, String) {
    info!("reload requested over HTTP");
    match app.config.reload().await {
        Ok(_) => (StatusCode::OK, "configuration reloaded\n".to_string()),
        Err(e) => {
            error!(error = %e, "configuration reload failed, keeping previous");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to reload config: {e}\n"))
        }
    }
}

// GET /health
async fn health(State(app): State<AppState>) -> Json<ExporterHealth> {
    Json(app.health.get_health(&app.config.current()))
}
