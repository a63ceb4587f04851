use artifex_core::media_server;
use artifex_core::{MediaServerClient, MediaServerError};
use artifex_model::{ConnectRequest, ConnectResponse, LibraryResponse};
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;
use crate::errors::ApiResult;

/// Probe the media server and persist the connection on success. Probe
/// failures are reported in-band so the UI can show them verbatim.
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> ApiResult<Json<ConnectResponse>> {
    let client = MediaServerClient::new(&request.url, &request.token)
        .map_err(artifex_core::CoreError::MediaServer)?;

    match client.probe().await {
        Ok(info) => {
            state
                .config_store()
                .set_media_server_config(&request.url, &request.token, &info.name)
                .await?;
            Ok(Json(ConnectResponse {
                success: true,
                message: "Connection successful".to_string(),
                server_name: Some(info.name),
            }))
        }
        Err(err) => {
            warn!("media server probe failed: {err}");
            Ok(Json(ConnectResponse {
                success: false,
                message: err.to_string(),
                server_name: None,
            }))
        }
    }
}

pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let (url, token, name) = state.config_store().media_server_config().await?;
    let configured = url.as_deref().is_some_and(|url| !url.is_empty())
        && token.as_deref().is_some_and(|token| !token.is_empty());
    Ok(Json(json!({
        "configured": configured,
        "url": url,
        "server_name": name,
    })))
}

pub async fn libraries(State(state): State<AppState>) -> ApiResult<Json<Vec<LibraryResponse>>> {
    let client = state.config_store().media_server_client().await?;
    let libraries = client
        .libraries()
        .await
        .map_err(artifex_core::CoreError::MediaServer)?
        .into_iter()
        .map(|library| LibraryResponse {
            id: library.id,
            name: library.name,
            kind: library.kind,
            item_count: library.item_count,
        })
        .collect();
    Ok(Json(libraries))
}

/// Posters the media server itself already knows for an item.
pub async fn available_posters(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
) -> ApiResult<Json<Value>> {
    let client = state.config_store().media_server_client().await?;
    let posters = client
        .available_posters(&item_key)
        .await
        .map_err(artifex_core::CoreError::MediaServer)?;
    Ok(Json(json!({ "posters": posters })))
}

pub async fn available_backgrounds(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
) -> ApiResult<Json<Value>> {
    let client = state.config_store().media_server_client().await?;
    let backgrounds = client
        .available_backgrounds(&item_key)
        .await
        .map_err(artifex_core::CoreError::MediaServer)?;
    Ok(Json(json!({ "backgrounds": backgrounds })))
}

#[derive(Debug, Deserialize)]
pub struct PinQuery {
    pub client_id: Option<String>,
}

fn client_identifier(query: &PinQuery) -> String {
    query
        .client_id
        .clone()
        .unwrap_or_else(|| "artifex".to_string())
}

pub async fn create_pin(Query(query): Query<PinQuery>) -> ApiResult<Json<Value>> {
    let (id, code) = media_server::create_pin(&client_identifier(&query), "Artifex").await?;
    Ok(Json(json!({ "id": id, "code": code })))
}

#[derive(Debug, Deserialize)]
pub struct PinCheckQuery {
    pub code: String,
    pub client_id: Option<String>,
}

pub async fn check_pin(
    Path(pin_id): Path<i64>,
    Query(query): Query<PinCheckQuery>,
) -> ApiResult<Json<Value>> {
    let client_id = query.client_id.clone().unwrap_or_else(|| "artifex".to_string());
    let token = media_server::check_pin(pin_id, &query.code, &client_id).await?;
    Ok(Json(json!({
        "authorized": token.is_some(),
        "auth_token": token,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResourcesQuery {
    pub token: String,
}

pub async fn resources(Query(query): Query<ResourcesQuery>) -> ApiResult<Json<Value>> {
    if query.token.is_empty() {
        return Err(artifex_core::CoreError::MediaServer(MediaServerError::Unauthorized).into());
    }
    let servers = media_server::resources(&query.token).await?;
    Ok(Json(json!({ "servers": servers })))
}
