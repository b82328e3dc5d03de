pub(crate) mod assessments;
pub(crate) mod enrollments;
pub(crate) mod notifications;
pub(crate) mod questions;
pub(crate) mod review_queue;
pub(crate) mod reviews;
pub(crate) mod users;
pub(crate) mod verdicts;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Assessment, AdminReview, QualityVerdict, Question};
use crate::db::types::{QuestionSource, QuestionStatus};

pub(crate) use notifications::NewNotification;
pub(crate) use review_queue::ReviewQueueEntry;
pub(crate) use reviews::NewAdminReview;
pub(crate) use verdicts::NewVerdict;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An assessment together with the lifecycle states of its questions,
/// read in one shot for the publication gate.
#[derive(Debug, Clone)]
pub(crate) struct AssessmentGate {
    pub(crate) assessment: Assessment,
    pub(crate) child_statuses: Vec<QuestionStatus>,
}

/// Read/write contract the pipeline holds against the relational store.
///
/// The store itself is an external collaborator: production wires
/// [`PgStore`], tests wire an in-memory double. Every conditional write
/// reports whether a row actually changed so callers can detect lost
/// races instead of re-reading.
#[async_trait]
pub(crate) trait PipelineStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_question(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<Question>, StoreError>;

    /// Conditionally move a question into `analyzing` and return the
    /// claimed row. `None` means the question does not exist, is already
    /// mid-analysis, or sits in a state that cannot re-enter analysis.
    async fn claim_for_analysis(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<Question>, StoreError>;

    /// Revert an `analyzing` question to `draft` after an analyzer failure.
    async fn release_to_draft(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    /// Move a question from one of `from` to `to`; false when the row was
    /// not in any of the expected states.
    async fn transition_status(
        &self,
        source: QuestionSource,
        question_id: &str,
        from: &[QuestionStatus],
        to: QuestionStatus,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn insert_verdict(&self, verdict: NewVerdict) -> Result<(), StoreError>;

    async fn latest_verdict(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<QualityVerdict>, StoreError>;

    async fn insert_review(&self, review: NewAdminReview) -> Result<AdminReview, StoreError>;

    async fn assessment_gate(
        &self,
        assessment_id: &str,
    ) -> Result<Option<AssessmentGate>, StoreError>;

    /// Flag an inactive assessment as awaiting the all-children-approved
    /// gate. False when it was already flagged or already active.
    async fn mark_pending_publish(
        &self,
        assessment_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    /// The race-safe publish transition: flips `is_active`/`pending_publish`
    /// in a single conditional update guarded on `pending_publish = TRUE`
    /// and reports whether this call won. Concurrent callers must never
    /// both observe `true`.
    async fn activate_if_pending(
        &self,
        assessment_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn enrolled_student_ids(&self, class_id: &str) -> Result<Vec<String>, StoreError>;

    async fn admin_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn list_review_queue(
        &self,
        status: QuestionStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ReviewQueueEntry>, i64), StoreError>;

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<(), StoreError>;
}

/// Production store backed by Postgres.
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_question(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<Question>, StoreError> {
        Ok(questions::find_by_id(&self.pool, source, question_id).await?)
    }

    async fn claim_for_analysis(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<Question>, StoreError> {
        Ok(questions::claim_for_analysis(&self.pool, source, question_id, now).await?)
    }

    async fn release_to_draft(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(questions::release_to_draft(&self.pool, source, question_id, now).await?)
    }

    async fn transition_status(
        &self,
        source: QuestionSource,
        question_id: &str,
        from: &[QuestionStatus],
        to: QuestionStatus,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(questions::transition_status(&self.pool, source, question_id, from, to, now).await?)
    }

    async fn insert_verdict(&self, verdict: NewVerdict) -> Result<(), StoreError> {
        Ok(verdicts::insert(&self.pool, verdict).await?)
    }

    async fn latest_verdict(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<QualityVerdict>, StoreError> {
        Ok(verdicts::latest_by_question(&self.pool, source, question_id).await?)
    }

    async fn insert_review(&self, review: NewAdminReview) -> Result<AdminReview, StoreError> {
        Ok(reviews::insert(&self.pool, review).await?)
    }

    async fn assessment_gate(
        &self,
        assessment_id: &str,
    ) -> Result<Option<AssessmentGate>, StoreError> {
        let Some(assessment) = assessments::find_by_id(&self.pool, assessment_id).await? else {
            return Ok(None);
        };
        let child_statuses =
            questions::statuses_by_assessment(&self.pool, assessment_id).await?;
        Ok(Some(AssessmentGate { assessment, child_statuses }))
    }

    async fn mark_pending_publish(
        &self,
        assessment_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(assessments::mark_pending_publish(&self.pool, assessment_id, now).await?)
    }

    async fn activate_if_pending(
        &self,
        assessment_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(assessments::activate_if_pending(&self.pool, assessment_id, now).await?)
    }

    async fn enrolled_student_ids(&self, class_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(enrollments::active_student_ids(&self.pool, class_id).await?)
    }

    async fn admin_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(users::admin_ids(&self.pool).await?)
    }

    async fn list_review_queue(
        &self,
        status: QuestionStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ReviewQueueEntry>, i64), StoreError> {
        let items = review_queue::list(&self.pool, status, skip, limit).await?;
        let total = review_queue::count(&self.pool, status).await?;
        Ok((items, total))
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<(), StoreError> {
        Ok(notifications::insert_many(&self.pool, notifications).await?)
    }
}
