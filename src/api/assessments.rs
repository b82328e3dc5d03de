use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_staff, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::assessment::ActivationResponse;
use crate::services::publication::{self, ActivationError};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:assessment_id/activate", post(activate_assessment))
}

/// Human attempt to publish an assessment. Publishes immediately when
/// every child question is approved; otherwise the assessment becomes a
/// publish candidate and the gate completes the transition once the last
/// question is approved.
async fn activate_assessment(
    Path(assessment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ActivationResponse>, ApiError> {
    require_staff(&user)?;

    let outcome =
        publication::request_activation(&state, &assessment_id, &user.id, user.is_admin())
            .await
            .map_err(|err| match err {
                ActivationError::NotFound => {
                    ApiError::NotFound("Assessment not found".to_string())
                }
                ActivationError::Forbidden => ApiError::Forbidden(err.to_string()),
                ActivationError::AlreadyActive => ApiError::Conflict(err.to_string()),
                ActivationError::NoQuestions => ApiError::BadRequest(err.to_string()),
                ActivationError::Store(err) => {
                    ApiError::internal(err, "Failed to read assessment")
                }
                ActivationError::Gate(err) => {
                    ApiError::internal(err, "Failed to run publish gate")
                }
            })?;

    Ok(Json(ActivationResponse::new(assessment_id, outcome)))
}
