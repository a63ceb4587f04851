use std::convert::Infallible;

use artifex_core::database::ScanRepository;
use artifex_model::{ScanStartRequest, ScanStatusResponse, ScanStreamEvent};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::{ApiError, ApiResult};

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<ScanStartRequest>,
) -> ApiResult<Json<Value>> {
    let config = request.config.unwrap_or_default();
    let scan_id = state.scan_engine.start_scan(config, "manual").await?;
    Ok(Json(json!({
        "scan_id": scan_id,
        "status": "running",
        "message": "Scan started",
    })))
}

/// Current scan status, falling back to the most recent scan when idle.
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let scans = ScanRepository::new(state.pool.clone());

    let scan = match state.scan_engine.current_scan_id().await {
        Some(scan_id) => scans.get(scan_id).await?,
        None => scans.latest().await?,
    };

    match scan {
        Some(scan) => Ok(Json(serde_json::to_value(ScanStatusResponse::from(scan))?)),
        None => Ok(Json(json!({
            "id": 0,
            "status": "pending",
            "total_items": 0,
            "processed_items": 0,
            "issues_found": 0,
            "editions_updated": 0,
        }))),
    }
}

pub async fn pause(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if !state.scan_engine.pause().await? {
        return Err(ApiError(artifex_core::CoreError::InvalidInput(
            "no scan is currently running".to_string(),
        )));
    }
    Ok(Json(json!({ "success": true, "message": "Scan paused" })))
}

pub async fn resume(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if !state.scan_engine.resume().await? {
        return Err(ApiError(artifex_core::CoreError::InvalidInput(
            "no scan is currently paused".to_string(),
        )));
    }
    Ok(Json(json!({ "success": true, "message": "Scan resumed" })))
}

pub async fn cancel(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if !state.scan_engine.cancel().await? {
        return Err(ApiError(artifex_core::CoreError::InvalidInput(
            "no scan is currently running".to_string(),
        )));
    }
    Ok(Json(json!({ "success": true, "message": "Scan cancelled" })))
}

pub async fn subscribe(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.scan_engine.subscribe();
    super::event_stream::<ScanStreamEvent>(receiver)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let scans = ScanRepository::new(state.pool.clone());
    let (records, total) = scans.history((page - 1) * page_size, page_size).await?;

    Ok(Json(json!({
        "scans": records,
        "total": total,
        "page": page,
        "page_size": page_size,
        "total_pages": (total + page_size - 1) / page_size,
    })))
}

pub async fn events(
    State(state): State<AppState>,
    Path(scan_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let scans = ScanRepository::new(state.pool.clone());
    if scans.get(scan_id).await?.is_none() {
        return Err(ApiError(artifex_core::CoreError::NotFound(format!(
            "scan {scan_id}"
        ))));
    }
    let events = scans.events(scan_id).await?;
    Ok(Json(json!({ "events": events })))
}

pub async fn interrupted(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let interrupted = state.scan_engine.find_interrupted().await?;
    Ok(Json(json!({
        "has_interrupted": interrupted.is_some(),
        "scan": interrupted,
    })))
}

pub async fn discard_interrupted(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let Some(scan) = state.scan_engine.find_interrupted().await? else {
        return Err(ApiError(artifex_core::CoreError::NotFound(
            "no interrupted scan".to_string(),
        )));
    };
    state.scan_engine.discard_interrupted(scan.id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Interrupted scan discarded",
    })))
}
