/// Health check endpoints
///
/// `/api/health` answers as long as the process is up; `/api/health/ready`
/// also checks the database and the upload directory.
use crate::{context::AppContext, error::AppResult, metrics};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    /// "healthy" or "unhealthy"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/health", get(health_basic))
        .route("/api/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "app": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe - database and upload storage
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> (StatusCode, Json<serde_json::Value>) {
    let checks = vec![
        component("database", check_database(&ctx).await),
        component("uploads", check_upload_storage(&ctx).await),
    ];

    let ready = checks.iter().all(|c| c.status == "healthy");
    if !ready {
        tracing::warn!("readiness_probe_failed: {:?}", checks);
    }

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "unavailable" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks
        })),
    )
}

fn component(name: &str, result: (AppResult<()>, u64)) -> ComponentHealth {
    let (outcome, elapsed_ms) = result;
    ComponentHealth {
        name: name.to_string(),
        status: if outcome.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
        response_time_ms: Some(elapsed_ms),
        error: outcome.err().map(|e| e.to_string()),
    }
}

/// Check database connectivity
async fn check_database(ctx: &AppContext) -> (AppResult<()>, u64) {
    let start = Instant::now();
    let result = sqlx::query("SELECT 1")
        .fetch_one(&ctx.db)
        .await
        .map(|_| ())
        .map_err(Into::into);
    (result, start.elapsed().as_millis() as u64)
}

/// Check the upload directory is present
async fn check_upload_storage(ctx: &AppContext) -> (AppResult<()>, u64) {
    let start = Instant::now();
    let result = tokio::fs::metadata(ctx.uploads.root())
        .await
        .map(|_| ())
        .map_err(Into::into);
    (result, start.elapsed().as_millis() as u64)
}

/// Prometheus exposition
pub async fn metrics_handler() -> (StatusCode, [(axum::http::HeaderName, &'static str); 1], String) {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::render_metrics(),
    )
}
