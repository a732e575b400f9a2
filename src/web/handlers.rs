//! HTTP request handlers.

use super::AppState;
use crate::monitor::{summarize, StatusSummary, TargetState};
use crate::report::render_digest;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Dashboard
// ============================================================================

/// The digest report, rendered live.
pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.snapshot();
    let digest = render_digest(&summarize(&snapshot), &snapshot, &Local::now());
    Html(digest.body)
}

// ============================================================================
// API: Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub summary: StatusSummary,
    pub targets: BTreeMap<String, TargetState>,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.engine.snapshot();
    Json(StatusResponse {
        summary: summarize(&targets),
        targets,
    })
}

pub async fn handle_get_targets(State(state): State<AppState>) -> impl IntoResponse {
    let targets: Vec<_> = state.engine.targets().map(|t| t.as_ref().clone()).collect();
    Json(targets)
}

// ============================================================================
// API: History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u64>,
}

pub async fn handle_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    if state.engine.target(&name).is_none() {
        return (StatusCode::NOT_FOUND, "Target not found").into_response();
    }

    let hours = query.hours.unwrap_or(24).min(24 * 365);
    match state
        .store
        .query_history(&name, Duration::from_secs(hours * 3600))
    {
        Ok(history) => Json(history).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<u32>,
}

pub async fn handle_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(1000);
    match state.store.recent_alerts(limit) {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
