use artifex_core::EditionEngine;
use artifex_core::edition::modules;
use artifex_model::EditionConfigData;
use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::ApiResult;

pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let engine = EditionEngine::new(state.pool.clone());
    let config = engine.config().await?;
    Ok(Json(json!({
        "config": config,
        "available_modules": modules::module_names(),
    })))
}

pub async fn put_config(
    State(state): State<AppState>,
    Json(config): Json<EditionConfigData>,
) -> ApiResult<Json<EditionConfigData>> {
    let engine = EditionEngine::new(state.pool.clone());
    Ok(Json(engine.update_config(config).await?))
}

/// Generate without writing anything.
pub async fn preview(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
) -> ApiResult<Json<Value>> {
    let client = state.config_store().media_server_client().await?;
    let engine = EditionEngine::new(state.pool.clone());
    let edition = engine.generate(&client, &item_key).await?;
    Ok(Json(json!({ "item_key": item_key, "edition": edition })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    /// Explicit edition string; generated from the item when omitted.
    pub edition: Option<String>,
}

pub async fn apply(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> ApiResult<Json<Value>> {
    let client = state.config_store().media_server_client().await?;
    let engine = EditionEngine::new(state.pool.clone());

    let edition = match request.edition {
        Some(edition) => Some(edition),
        None => engine.generate(&client, &item_key).await?,
    };
    let Some(edition) = edition.filter(|edition| !edition.is_empty()) else {
        return Ok(Json(json!({
            "success": false,
            "message": "No edition string could be generated",
        })));
    };

    engine.apply(&client, &item_key, &edition).await?;
    Ok(Json(json!({ "success": true, "edition": edition })))
}

pub async fn restore(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
) -> ApiResult<Json<Value>> {
    let client = state.config_store().media_server_client().await?;
    let engine = EditionEngine::new(state.pool.clone());
    let restored = engine.restore(&client, &item_key).await?;
    Ok(Json(json!({
        "success": restored,
        "message": if restored { "Edition restored" } else { "No backup exists for this item" },
    })))
}
