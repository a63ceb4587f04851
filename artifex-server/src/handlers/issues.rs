use artifex_core::database::IssueRepository;
use artifex_core::{ArtworkAggregator, CoreError};
use artifex_model::{
    ArtworkKind, IssueAcceptRequest, IssueFilter, IssueListResponse, IssueStats, IssueStatus,
    IssueWithSuggestions,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;
use crate::errors::{ApiError, ApiResult};

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<IssueFilter>,
) -> ApiResult<Json<IssueListResponse>> {
    let repo = IssueRepository::new(state.pool.clone());
    let page = filter.page.unwrap_or(1).max(1);
    let page_size = filter.page_size.unwrap_or(50).clamp(1, 100);
    let (issues, total) = repo.list(&filter).await?;
    Ok(Json(IssueListResponse {
        total,
        page,
        page_size,
        issues,
    }))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<IssueStats>> {
    let repo = IssueRepository::new(state.pool.clone());
    Ok(Json(repo.stats().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
) -> ApiResult<Json<IssueWithSuggestions>> {
    let repo = IssueRepository::new(state.pool.clone());
    let issue = repo
        .get_with_suggestions(issue_id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("issue {issue_id}"))))?;
    Ok(Json(issue))
}

/// Apply a chosen suggestion to the server, lock the field, and mark the
/// issue applied.
pub async fn accept(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
    Json(request): Json<IssueAcceptRequest>,
) -> ApiResult<Json<Value>> {
    let repo = IssueRepository::new(state.pool.clone());
    let issue = repo
        .get_with_suggestions(issue_id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("issue {issue_id}"))))?;
    let suggestion = issue
        .suggestions
        .iter()
        .find(|suggestion| suggestion.id == request.suggestion_id)
        .ok_or_else(|| {
            ApiError(CoreError::NotFound(format!(
                "suggestion {}",
                request.suggestion_id
            )))
        })?;

    let client = state.config_store().media_server_client().await?;
    let item_key = &issue.issue.item_key;

    match suggestion.artwork_kind {
        ArtworkKind::Poster => {
            client
                .upload_poster(item_key, &suggestion.image_url)
                .await
                .map_err(CoreError::MediaServer)?;
            if let Err(err) = client.lock_poster(item_key).await {
                warn!(%item_key, "poster applied but lock failed: {err}");
            }
        }
        ArtworkKind::Background => {
            client
                .upload_background(item_key, &suggestion.image_url)
                .await
                .map_err(CoreError::MediaServer)?;
            if let Err(err) = client.lock_background(item_key).await {
                warn!(%item_key, "background applied but lock failed: {err}");
            }
        }
        ArtworkKind::Logo => {
            return Err(ApiError(CoreError::InvalidInput(
                "logo application is not supported".to_string(),
            )));
        }
    }

    repo.mark_applied(issue_id, suggestion.id).await?;
    Ok(Json(json!({ "success": true, "message": "Artwork applied" })))
}

pub async fn skip(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let repo = IssueRepository::new(state.pool.clone());
    if repo.get(issue_id).await?.is_none() {
        return Err(ApiError(CoreError::NotFound(format!("issue {issue_id}"))));
    }
    repo.set_status(issue_id, IssueStatus::Rejected, true).await?;
    Ok(Json(json!({ "success": true, "message": "Issue skipped" })))
}

/// Re-run the aggregator for one issue and atomically replace its
/// suggestions.
pub async fn refresh(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let repo = IssueRepository::new(state.pool.clone());
    let issue = repo
        .get(issue_id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("issue {issue_id}"))))?;

    if issue.external_ids.is_empty() {
        return Err(ApiError(CoreError::InvalidInput(
            "issue has no external ids to search with".to_string(),
        )));
    }
    let Some(wanted) = issue.defect.artwork_kind() else {
        return Err(ApiError(CoreError::InvalidInput(format!(
            "defect {} has no artwork to suggest",
            issue.defect
        ))));
    };

    let aggregator = ArtworkAggregator::from_config(&state.config_store()).await?;
    let candidates = aggregator
        .fetch(issue.media_kind, &issue.external_ids, &[wanted])
        .await;
    let count = repo.replace_suggestions(issue_id, &candidates).await?;

    Ok(Json(json!({ "success": true, "count": count })))
}
