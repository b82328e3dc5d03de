use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::QuestionStatus;
use crate::repositories::StoreError;
use crate::services::notifications;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActivationOutcome {
    /// Every question was already approved; the assessment went live.
    Published,
    /// At least one question is not approved yet; the assessment waits for
    /// the gate.
    Pending,
}

#[derive(Debug, Error)]
pub(crate) enum ActivationError {
    #[error("assessment not found")]
    NotFound,
    #[error("only the owning teacher or an administrator can activate an assessment")]
    Forbidden,
    #[error("assessment is already active")]
    AlreadyActive,
    #[error("assessment has no questions")]
    NoQuestions,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("publish gate failed: {0}")]
    Gate(String),
}

/// Check whether `assessment_id` can be auto-published and, if so, perform
/// the transition. Returns `true` only for the call that actually flipped
/// the row.
///
/// Called redundantly: once per question reaching `approved`, plus on every
/// human activation attempt. Safe under that redundancy because the
/// decision who publishes is made by the conditional update, not by the
/// preceding reads; a caller that loses the race sends no notifications.
pub(crate) async fn try_auto_publish(state: &AppState, assessment_id: &str) -> Result<bool> {
    let gate = state
        .store()
        .assessment_gate(assessment_id)
        .await
        .context("Failed to read assessment gate")?;

    let Some(gate) = gate else {
        return Ok(false);
    };

    if gate.assessment.is_active || !gate.assessment.pending_publish {
        return Ok(false);
    }

    if gate.child_statuses.is_empty() {
        return Ok(false);
    }

    if gate.child_statuses.iter().any(|status| *status != QuestionStatus::Approved) {
        return Ok(false);
    }

    let won = state
        .store()
        .activate_if_pending(assessment_id, primitive_now_utc())
        .await
        .context("Failed to run publish transition")?;

    if !won {
        tracing::debug!(assessment_id, "Publish race lost; another caller already published");
        return Ok(false);
    }

    metrics::counter!("assessment_auto_publish_total").increment(1);

    let student_ids = match state.store().enrolled_student_ids(&gate.assessment.class_id).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::error!(
                assessment_id,
                class_id = %gate.assessment.class_id,
                error = %err,
                "Failed to load enrolled students; publishing without student notifications"
            );
            Vec::new()
        }
    };

    notifications::deliver(
        state,
        notifications::assessment_published(&gate.assessment, &student_ids),
    )
    .await;

    tracing::info!(
        assessment_id,
        students = student_ids.len(),
        "Assessment auto-published"
    );

    Ok(true)
}

/// A human attempt to activate an assessment. Immediate publishes funnel
/// through the same conditional gate as question-approval triggers, so
/// publish notifications stay exactly-once even when an approval races the
/// activation.
pub(crate) async fn request_activation(
    state: &AppState,
    assessment_id: &str,
    actor_id: &str,
    actor_is_admin: bool,
) -> Result<ActivationOutcome, ActivationError> {
    let gate = state
        .store()
        .assessment_gate(assessment_id)
        .await?
        .ok_or(ActivationError::NotFound)?;

    if !actor_is_admin && gate.assessment.teacher_id != actor_id {
        return Err(ActivationError::Forbidden);
    }

    if gate.assessment.is_active {
        return Err(ActivationError::AlreadyActive);
    }

    if gate.child_statuses.is_empty() {
        return Err(ActivationError::NoQuestions);
    }

    // Idempotent: false just means the assessment was already a publish
    // candidate.
    state.store().mark_pending_publish(assessment_id, primitive_now_utc()).await?;

    let published = try_auto_publish(state, assessment_id)
        .await
        .map_err(|err| ActivationError::Gate(err.to_string()))?;

    if published {
        Ok(ActivationOutcome::Published)
    } else {
        Ok(ActivationOutcome::Pending)
    }
}
