// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads are public; `POST rescan`
// requires the admin bearer token. A rescan runs in the background and the
// request returns as soon as the Running phase has been claimed.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::authorize;
use crate::app_state::AppState;
use crate::error::ScanError;

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/report", get(report))
        .route("/api/v1/report/table", get(report_table))
        .route("/api/v1/summary", get(summary))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/rescan", post(rescan))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn no_report() -> Response {
    error_body(StatusCode::NOT_FOUND, "No report available yet")
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    report_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        report_version: state.current_report_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Status
// =============================================================================

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.status())
}

// =============================================================================
// Report views
// =============================================================================

async fn report(State(state): State<Arc<AppState>>) -> Response {
    match state.scanner.state().latest_report() {
        Some(report) => Json(serde_json::json!({
            "report_version": state.current_report_version(),
            "report": &*report,
            "summaries": report.summaries(),
        }))
        .into_response(),
        None => no_report(),
    }
}

async fn report_table(State(state): State<Arc<AppState>>) -> Response {
    let Some(report) = state.scanner.state().latest_report() else {
        return no_report();
    };
    let columns: Vec<&str> = state
        .scanner
        .config()
        .timeframes
        .iter()
        .map(|t| t.label.as_str())
        .collect();
    Json(serde_json::json!({
        "completed_at": report.completed_at,
        "columns": columns,
        "rows": report.table(),
    }))
    .into_response()
}

async fn summary(State(state): State<Arc<AppState>>) -> Response {
    match state.scanner.state().latest_report() {
        Some(report) => Json(report.summaries()).into_response(),
        None => no_report(),
    }
}

// =============================================================================
// Rescan (authenticated)
// =============================================================================

async fn rescan(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&headers, state.admin_token.as_deref()) {
        return rejection.into_response();
    }

    let guard = match state.scanner.start_rescan() {
        Ok(guard) => guard,
        Err(e @ ScanError::AlreadyRunning) => {
            warn!("rescan refused: scan in progress");
            return error_body(StatusCode::CONFLICT, e.to_string());
        }
        Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    info!("rescan accepted via API");
    let task_state = state.clone();
    tokio::spawn(async move {
        task_state.scanner.execute(guard).await;
        task_state.mark_published();
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
