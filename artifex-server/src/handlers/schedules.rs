use artifex_core::CoreError;
use artifex_core::database::schedules::{ScheduleDraft, ScheduleRepository};
use artifex_core::scheduler::parse_crontab;
use artifex_model::{ScanConfig, ScheduleCreateRequest, ScheduleResponse};
use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::{ApiError, ApiResult};

fn draft_from_request(request: &ScheduleCreateRequest) -> Result<ScheduleDraft, ApiError> {
    // Reject malformed cron before anything reaches the scheduler.
    parse_crontab(&request.cron_expression)?;

    if request.name.trim().is_empty() {
        return Err(ApiError(CoreError::InvalidInput(
            "schedule name must not be empty".to_string(),
        )));
    }

    let mut config = request.config.clone().unwrap_or_default();
    config.kind = request.scan_kind;

    Ok(ScheduleDraft {
        name: request.name.clone(),
        cron_expression: request.cron_expression.clone(),
        scan_kind: request.scan_kind,
        config_json: serde_json::to_string(&config).map_err(CoreError::from)?,
        auto_commit: request.auto_commit,
        auto_commit_options_json: request
            .auto_commit_options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(CoreError::from)?,
    })
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let repo = ScheduleRepository::new(state.pool.clone());
    let schedules = repo
        .list()
        .await?
        .into_iter()
        .map(ScheduleResponse::from)
        .collect();
    Ok(Json(schedules))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<ScheduleCreateRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let draft = draft_from_request(&request)?;
    let repo = ScheduleRepository::new(state.pool.clone());
    let schedule = repo.create(&draft).await?;
    state.scheduler.add_job(&schedule).await?;
    Ok(Json(ScheduleResponse::from(schedule)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<ScheduleResponse>> {
    let repo = ScheduleRepository::new(state.pool.clone());
    let schedule = repo
        .get(schedule_id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("schedule {schedule_id}"))))?;
    Ok(Json(ScheduleResponse::from(schedule)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
    Json(request): Json<ScheduleCreateRequest>,
) -> ApiResult<Json<ScheduleResponse>> {
    let draft = draft_from_request(&request)?;
    let repo = ScheduleRepository::new(state.pool.clone());
    let schedule = repo.update(schedule_id, &draft).await?;
    state.scheduler.refresh_job(schedule_id).await?;
    Ok(Json(ScheduleResponse::from(schedule)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let repo = ScheduleRepository::new(state.pool.clone());
    state.scheduler.remove_job(schedule_id);
    if !repo.delete(schedule_id).await? {
        return Err(ApiError(CoreError::NotFound(format!(
            "schedule {schedule_id}"
        ))));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn enable(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    set_enabled(&state, schedule_id, true).await
}

pub async fn disable(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    set_enabled(&state, schedule_id, false).await
}

async fn set_enabled(state: &AppState, schedule_id: i64, enabled: bool) -> ApiResult<Json<Value>> {
    let repo = ScheduleRepository::new(state.pool.clone());
    if !repo.set_enabled(schedule_id, enabled).await? {
        return Err(ApiError(CoreError::NotFound(format!(
            "schedule {schedule_id}"
        ))));
    }
    state.scheduler.refresh_job(schedule_id).await?;
    Ok(Json(json!({ "success": true, "enabled": enabled })))
}

pub async fn run_now(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.scheduler.run_now(schedule_id).await?;
    Ok(Json(json!({ "success": true, "message": "Schedule triggered" })))
}
