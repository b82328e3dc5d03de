use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::types::QuestionStatus;
use crate::schemas::question::ReviewQueueItemResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewQueueParams {
    status: Option<String>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

/// Admin-facing feed of pending questions across every source, most
/// urgent first. Read-only.
pub(crate) async fn list_review_queue(
    CurrentAdmin(_admin): CurrentAdmin,
    Query(params): Query<ReviewQueueParams>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<ReviewQueueItemResponse>>, ApiError> {
    let status = match params.status.as_deref() {
        None => QuestionStatus::AdminReview,
        Some(raw) => QuestionStatus::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown status filter: {raw}")))?,
    };

    let (entries, total_count) = state
        .store()
        .list_review_queue(status, params.skip, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to read review queue"))?;

    Ok(Json(PaginatedResponse {
        items: entries.into_iter().map(ReviewQueueItemResponse::from).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}
