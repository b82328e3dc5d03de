use anyhow::{Context, Result};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::AdminReview;
use crate::db::types::{
    BoundednessTier, DifficultyLevel, HotsTier, QuestionSource, QuestionStatus, ReviewDecision,
};
use crate::repositories::{NewAdminReview, NewVerdict, StoreError};
use crate::services::analyzer::AnalysisError;
use crate::services::notifications;
use crate::services::publication;
use crate::services::routing::{self, RoutingAction};

/// Detach one question's analysis from the caller. The HTTP response does
/// not wait for the analyzer; failures are absorbed here and only ever
/// observable through the question's state.
pub(crate) fn spawn_analysis(state: &AppState, source: QuestionSource, question_id: String) {
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = analyze_question(&state, source, &question_id).await {
            tracing::error!(
                source = source.as_str(),
                question_id = %question_id,
                error = %err,
                "Question analysis pipeline failed"
            );
        }
    });
}

/// Drive one question through analysis: claim it (`draft -> analyzing`,
/// persisted before the slow call), invoke the analyzer, persist the
/// verdict stamped with its routing outcome, transition the status and fan
/// out side effects.
///
/// Analyzer failures revert the question to `draft` and insert nothing;
/// the pipeline never leaves a question in `analyzing` on its own error
/// paths.
pub(crate) async fn analyze_question(
    state: &AppState,
    source: QuestionSource,
    question_id: &str,
) -> Result<()> {
    let claimed = state
        .store()
        .claim_for_analysis(source, question_id, primitive_now_utc())
        .await
        .context("Failed to claim question for analysis")?;

    let Some(question) = claimed else {
        tracing::info!(
            source = source.as_str(),
            question_id,
            "Skipping analysis; question missing or not claimable"
        );
        return Ok(());
    };

    let timer = Instant::now();
    let decoded = match state.analyzer().analyze(&question).await {
        Ok(decoded) => decoded,
        Err(err) => {
            let outcome = match &err {
                AnalysisError::Provider(_) => "provider_failure",
                AnalysisError::Malformed { raw, .. } => {
                    tracing::debug!(raw = %raw, "Analyzer reply that failed to decode");
                    "malformed_response"
                }
            };
            metrics::counter!("analysis_jobs_total", "status" => outcome).increment(1);
            tracing::error!(
                source = source.as_str(),
                question_id,
                error = %err,
                "Analyzer call failed; reverting question to draft"
            );

            state
                .store()
                .release_to_draft(source, question_id, primitive_now_utc())
                .await
                .context("Failed to revert question to draft")?;
            return Ok(());
        }
    };

    let duration = timer.elapsed().as_secs_f64();
    let decision =
        routing::route(&decoded.report, question.declared_difficulty, question.claims_hots);
    let now = primitive_now_utc();

    let report = &decoded.report;
    let verdict = NewVerdict {
        id: Uuid::new_v4().to_string(),
        source,
        question_id: question.id.clone(),
        bloom_level: report.bloom_level,
        bloom_secondary: report.bloom_secondary.clone(),
        hots_tier: report.hots_tier,
        boundedness: report.boundedness,
        difficulty_score: report.difficulty_score,
        difficulty_label: report
            .difficulty_label
            .or_else(|| report.difficulty_score.map(DifficultyLevel::from_score)),
        clarity_score: report.clarity_score,
        ambiguity_flags: report.ambiguity_flags.clone(),
        missing_info_flags: report.missing_info_flags.clone(),
        grade_mismatch_flags: report.grade_mismatch_flags.clone(),
        suggested_edits: report.suggested_edits.clone(),
        bloom_confidence: report.confidence.bloom,
        hots_confidence: report.confidence.hots,
        boundedness_confidence: report.confidence.boundedness,
        difficulty_confidence: report.confidence.difficulty,
        review_priority: decision.priority(),
        routing_reasons: decision.reason_messages(),
        report: decoded.raw.clone(),
        created_at: now,
    };

    state.store().insert_verdict(verdict).await.context("Failed to persist verdict")?;

    let next_status = match decision.action {
        RoutingAction::AutoApprove => QuestionStatus::Approved,
        RoutingAction::AdminReview => QuestionStatus::AdminReview,
    };

    let transitioned = state
        .store()
        .transition_status(source, &question.id, &[QuestionStatus::Analyzing], next_status, now)
        .await
        .context("Failed to persist analysis outcome")?;

    if !transitioned {
        tracing::warn!(
            source = source.as_str(),
            question_id,
            "Question left analyzing mid-flight; analysis outcome not applied"
        );
        return Ok(());
    }

    metrics::counter!("analysis_jobs_total", "status" => "success").increment(1);
    metrics::histogram!("analysis_duration_seconds").record(duration);

    match decision.action {
        RoutingAction::AdminReview => {
            let admin_ids = match state.store().admin_ids().await {
                Ok(ids) => ids,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to load admin ids for review fan-out");
                    Vec::new()
                }
            };
            notifications::deliver(
                state,
                notifications::review_requested(
                    &question,
                    &decision.reason_messages(),
                    &admin_ids,
                ),
            )
            .await;
        }
        RoutingAction::AutoApprove => {
            // Best-effort: the gate is idempotent and re-checked on every
            // approval, so a failure here never rolls the question back.
            if let Some(assessment_id) = question.assessment_id.as_deref() {
                if let Err(err) = publication::try_auto_publish(state, assessment_id).await {
                    tracing::error!(
                        assessment_id,
                        error = %err,
                        "Auto-publish check failed after question approval"
                    );
                }
            }
        }
    }

    tracing::info!(
        source = source.as_str(),
        question_id,
        status = ?next_status,
        priority = ?decision.priority(),
        duration_seconds = duration,
        "Question analysis completed"
    );

    Ok(())
}

/// A human reviewer's decision on a question sitting in the review queue.
#[derive(Debug, Clone)]
pub(crate) struct ReviewCommand {
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) decision: ReviewDecision,
    pub(crate) notes: Option<String>,
    pub(crate) return_reasons: Vec<String>,
    pub(crate) bloom_override: Option<i16>,
    pub(crate) hots_override: Option<HotsTier>,
    pub(crate) boundedness_override: Option<BoundednessTier>,
    pub(crate) difficulty_override: Option<f64>,
}

#[derive(Debug, Error)]
pub(crate) enum ReviewError {
    #[error("question not found")]
    NotFound,
    #[error("question cannot take this decision in its current state")]
    InvalidState,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Apply a reviewer decision synchronously. Unlike the analysis loop this
/// is request/response: the caller learns immediately whether the decision
/// was applied. Notification side effects stay best-effort and never
/// revert the transition.
pub(crate) async fn apply_review(
    state: &AppState,
    command: ReviewCommand,
) -> Result<AdminReview, ReviewError> {
    let question = state
        .store()
        .find_question(command.source, &command.question_id)
        .await?
        .ok_or(ReviewError::NotFound)?;

    let (from, to): (&[QuestionStatus], QuestionStatus) = match command.decision {
        ReviewDecision::Approve => (&[QuestionStatus::AdminReview], QuestionStatus::Approved),
        ReviewDecision::Return => (&[QuestionStatus::AdminReview], QuestionStatus::Returned),
        ReviewDecision::Archive => (
            &[QuestionStatus::AdminReview, QuestionStatus::Approved],
            QuestionStatus::Archived,
        ),
    };

    let now = primitive_now_utc();
    let transitioned = state
        .store()
        .transition_status(command.source, &command.question_id, from, to, now)
        .await?;

    if !transitioned {
        return Err(ReviewError::InvalidState);
    }

    let review = state
        .store()
        .insert_review(NewAdminReview {
            id: Uuid::new_v4().to_string(),
            source: command.source,
            question_id: command.question_id.clone(),
            reviewer_id: command.reviewer_id.clone(),
            decision: command.decision,
            notes: command.notes.clone(),
            return_reasons: command.return_reasons.clone(),
            bloom_override: command.bloom_override,
            hots_override: command.hots_override,
            boundedness_override: command.boundedness_override,
            difficulty_override: command.difficulty_override,
            created_at: now,
        })
        .await?;

    match command.decision {
        ReviewDecision::Approve => {
            notifications::deliver(state, notifications::question_approved(&question)).await;
            if let Some(assessment_id) = question.assessment_id.as_deref() {
                if let Err(err) = publication::try_auto_publish(state, assessment_id).await {
                    tracing::error!(
                        assessment_id,
                        error = %err,
                        "Auto-publish check failed after review approval"
                    );
                }
            }
        }
        ReviewDecision::Return => {
            notifications::deliver(
                state,
                notifications::question_returned(&question, &command.return_reasons),
            )
            .await;
        }
        ReviewDecision::Archive => {}
    }

    tracing::info!(
        source = command.source.as_str(),
        question_id = %command.question_id,
        reviewer_id = %command.reviewer_id,
        decision = ?command.decision,
        "Review decision applied"
    );

    Ok(review)
}
