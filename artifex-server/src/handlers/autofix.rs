use std::convert::Infallible;

use artifex_model::{AutoApplyEvent, AutoApplyOptions};
use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::ApiResult;

pub async fn start(
    State(state): State<AppState>,
    Json(options): Json<AutoApplyOptions>,
) -> ApiResult<Json<Value>> {
    state.auto_apply.start(options)?;
    Ok(Json(json!({ "success": true, "message": "Auto-apply started" })))
}

pub async fn cancel(State(state): State<AppState>) -> Json<Value> {
    state.auto_apply.cancel();
    Json(json!({ "success": true }))
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "running": state.auto_apply.is_running(),
        "progress": state.auto_apply.progress(),
    }))
}

pub async fn subscribe(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.auto_apply.subscribe();
    super::event_stream::<AutoApplyEvent>(receiver)
}
