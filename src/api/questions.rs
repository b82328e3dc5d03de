use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_staff, CurrentAdmin, CurrentUser, Identity};
use crate::core::state::AppState;
use crate::db::models::Question;
use crate::db::types::QuestionSource;
use crate::schemas::question::{
    AnalyzeQueuedResponse, BulkAnalyzeRequest, BulkQueuedResponse, VerdictResponse,
};
use crate::schemas::review::{ReviewRequest, ReviewResponse};
use crate::services::dispatch;
use crate::services::lifecycle::{self, ReviewCommand, ReviewError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:source/questions/:question_id/analyze", post(analyze_question))
        .route("/:source/questions/:question_id/verdict", get(latest_verdict))
        .route("/:source/questions/:question_id/review", post(review_question))
}

pub(crate) fn bulk_router() -> Router<AppState> {
    Router::new().route("/analyze-bulk", post(analyze_bulk))
}

/// Enqueue quality analysis for one question. Returns as soon as the
/// background task is spawned; the analysis outcome is only observable
/// through the question's status and the review queue.
async fn analyze_question(
    Path((source, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AnalyzeQueuedResponse>), ApiError> {
    require_staff(&user)?;
    let source = parse_source(&source)?;
    let question = fetch_question(&state, source, &question_id).await?;
    require_question_access(&user, &question)?;

    lifecycle::spawn_analysis(&state, source, question_id.clone());

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeQueuedResponse { source, question_id, status: "queued" }),
    ))
}

/// Enqueue analysis for a batch of questions. Items the caller may not
/// touch (missing, or another teacher's) are skipped, never failed; the
/// dispatcher takes over after the 202.
async fn analyze_bulk(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<BulkAnalyzeRequest>,
) -> Result<(StatusCode, Json<BulkQueuedResponse>), ApiError> {
    require_staff(&user)?;
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let requested = payload.items.len();
    let mut accepted = Vec::with_capacity(requested);

    for item in payload.items {
        let question = state
            .store()
            .find_question(item.source, &item.question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

        match question {
            Some(question) if user.is_admin() || question.teacher_id == user.id => {
                accepted.push((item.source, item.question_id));
            }
            Some(_) | None => {
                tracing::info!(
                    source = item.source.as_str(),
                    question_id = %item.question_id,
                    "Skipping bulk item; question missing or not owned by caller"
                );
            }
        }
    }

    let accepted_count = accepted.len();
    dispatch::dispatch_bulk(&state, accepted);

    Ok((
        StatusCode::ACCEPTED,
        Json(BulkQueuedResponse {
            accepted: accepted_count,
            skipped: requested - accepted_count,
            status: "queued",
        }),
    ))
}

async fn latest_verdict(
    Path((source, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<VerdictResponse>, ApiError> {
    require_staff(&user)?;
    let source = parse_source(&source)?;
    let question = fetch_question(&state, source, &question_id).await?;
    require_question_access(&user, &question)?;

    let verdict = state
        .store()
        .latest_verdict(source, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch verdict"))?
        .ok_or_else(|| ApiError::NotFound("No verdict for this question yet".to_string()))?;

    Ok(Json(VerdictResponse::from(verdict)))
}

/// Synchronous human decision: approve, return or archive a question
/// sitting in the review queue.
async fn review_question(
    Path((source, question_id)): Path<(String, String)>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let source = parse_source(&source)?;
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let command = ReviewCommand {
        source,
        question_id,
        reviewer_id: admin.id,
        decision: payload.decision,
        notes: payload.notes,
        return_reasons: payload.return_reasons,
        bloom_override: payload.bloom_override,
        hots_override: payload.hots_override,
        boundedness_override: payload.boundedness_override,
        difficulty_override: payload.difficulty_override,
    };

    let review = lifecycle::apply_review(&state, command).await.map_err(|err| match err {
        ReviewError::NotFound => ApiError::NotFound("Question not found".to_string()),
        ReviewError::InvalidState => ApiError::Conflict(err.to_string()),
        ReviewError::Store(err) => ApiError::internal(err, "Failed to apply review decision"),
    })?;

    Ok(Json(ReviewResponse::from(review)))
}

pub(super) fn parse_source(value: &str) -> Result<QuestionSource, ApiError> {
    QuestionSource::parse(value)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown question source: {value}")))
}

async fn fetch_question(
    state: &AppState,
    source: QuestionSource,
    question_id: &str,
) -> Result<Question, ApiError> {
    state
        .store()
        .find_question(source, question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))
}

fn require_question_access(user: &Identity, question: &Question) -> Result<(), ApiError> {
    if user.is_admin() || question.teacher_id == user.id {
        return Ok(());
    }
    Err(ApiError::Forbidden("Access denied".to_string()))
}

#[cfg(test)]
mod tests;
