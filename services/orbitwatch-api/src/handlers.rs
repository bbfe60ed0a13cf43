use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{TimeZone, Utc};
use orbitwatch_core::RiskLevel;
use orbitwatch_engine::{Engine, PublishedCycle};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "no cycle has been published yet" })),
    )
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

/// Run an engine read on the blocking pool; the store and history locks are
/// held across SQLite commits.
async fn read_engine<T, F>(state: &AppState, read: F) -> Result<T, ApiError>
where
    F: FnOnce(&Engine) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || read(&engine))
        .await
        .map_err(|e| {
            error!("Engine read task failed: {}", e);
            internal_error("engine state unavailable")
        })
}

async fn latest(state: &AppState) -> Result<Arc<PublishedCycle>, ApiError> {
    read_engine(state, |engine| engine.latest())
        .await?
        .ok_or_else(unavailable)
}

fn published_at(cycle: &PublishedCycle) -> Option<String> {
    Utc.timestamp_millis_opt(cycle.published_at_ms)
        .single()
        .map(|t| t.to_rfc3339())
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult {
    let (history, version) = read_engine(&state, |engine| {
        (engine.history_health(), engine.latest().map(|c| c.version))
    })
    .await?;
    let healthy = history.as_ref().map(|h| h.is_ok()).unwrap_or(true);
    Ok(Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "orbitwatch-api",
        "version": version,
        "history": history,
        "timestamp": Utc::now().to_rfc3339()
    })))
}

pub async fn snapshot(State(state): State<Arc<AppState>>) -> ApiResult {
    let cycle = latest(&state).await?;
    Ok(Json(json!({
        "version": cycle.version,
        "published_at": published_at(&cycle),
        "fingerprint": cycle.fingerprint,
        "snapshot": cycle.snapshot
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConjunctionFilter {
    /// Keep events at or above this level
    pub min_risk: Option<RiskLevel>,
    /// Keep events involving this object
    pub object_id: Option<String>,
}

pub async fn conjunctions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ConjunctionFilter>,
) -> ApiResult {
    let cycle = latest(&state).await?;
    let events: Vec<_> = cycle
        .events
        .iter()
        .filter(|e| filter.min_risk.map_or(true, |min| e.risk_level >= min))
        .filter(|e| filter.object_id.as_deref().map_or(true, |id| e.involves(id)))
        .collect();
    Ok(Json(json!({
        "version": cycle.version,
        "evaluation_epoch_s": cycle.snapshot.evaluation_epoch_s,
        "count": events.len(),
        "events": events
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let limit = query
        .limit
        .unwrap_or(state.config.history_limit)
        .min(state.config.history_limit);

    let summaries = read_engine(&state, move |engine| {
        engine.latest().map(|_| engine.history_summaries(limit))
    })
    .await?
    .ok_or_else(unavailable)?
    .map_err(|e| {
        error!("History query failed: {}", e);
        internal_error("history unavailable")
    })?;

    Ok(Json(json!({ "cycles": summaries })))
}
