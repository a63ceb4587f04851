use artifex_core::{ArtworkAggregator, CoreError};
use artifex_model::{ArtworkSource, ProviderSettingsRequest, ProviderSettingsResponse};
use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::{ApiError, ApiResult};

async fn provider_settings(state: &AppState) -> ApiResult<ProviderSettingsResponse> {
    let store = state.config_store();
    Ok(ProviderSettingsResponse {
        fanart: store.provider_configured(ArtworkSource::Fanart).await?,
        mediux: store.provider_configured(ArtworkSource::Mediux).await?,
        tmdb: store.provider_configured(ArtworkSource::Tmdb).await?,
        tvdb: store.provider_configured(ArtworkSource::Tvdb).await?,
        provider_priority: store.provider_priority().await?,
    })
}

pub async fn get_providers(
    State(state): State<AppState>,
) -> ApiResult<Json<ProviderSettingsResponse>> {
    Ok(Json(provider_settings(&state).await?))
}

pub async fn put_providers(
    State(state): State<AppState>,
    Json(request): Json<ProviderSettingsRequest>,
) -> ApiResult<Json<ProviderSettingsResponse>> {
    let store = state.config_store();

    for (source, key) in [
        (ArtworkSource::Fanart, &request.fanart_api_key),
        (ArtworkSource::Mediux, &request.mediux_api_key),
        (ArtworkSource::Tmdb, &request.tmdb_api_key),
        (ArtworkSource::Tvdb, &request.tvdb_api_key),
    ] {
        if let Some(key) = key {
            store.set_provider_key(source, key).await?;
        }
    }

    if let Some(priority) = &request.provider_priority {
        store.set_provider_priority(priority).await?;
    }

    Ok(Json(provider_settings(&state).await?))
}

pub async fn test_provider(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> ApiResult<Json<Value>> {
    let source: ArtworkSource = source
        .parse()
        .map_err(|_| ApiError(CoreError::InvalidInput(format!("unknown provider: {source}"))))?;

    let aggregator = ArtworkAggregator::from_config(&state.config_store()).await?;
    let result = aggregator.probe(source).await;

    Ok(Json(json!({
        "provider": source,
        "success": result.unwrap_or(false),
        "message": match result {
            Some(true) => "Connection successful",
            Some(false) => "Connection failed",
            None => "Provider is not configured",
        },
    })))
}
