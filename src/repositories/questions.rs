use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::db::types::{QuestionSource, QuestionStatus};

pub(crate) const COLUMNS: &str = "\
    id, source, assessment_id, teacher_id, subject, grade_band, content, kind, \
    options, correct_answer, declared_difficulty, claims_hots, status, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    source: QuestionSource,
    question_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE source = $1 AND id = $2"
    ))
    .bind(source)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}

/// Claim a question for analysis. The transition is persisted before the
/// analyzer is invoked, so a concurrent edit sees `analyzing` and cannot
/// double-trigger a question already mid-flight.
pub(crate) async fn claim_for_analysis(
    pool: &PgPool,
    source: QuestionSource,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions
         SET status = $1, updated_at = $2
         WHERE source = $3
           AND id = $4
           AND status IN ($5, $6, $7)
         RETURNING {COLUMNS}"
    ))
    .bind(QuestionStatus::Analyzing)
    .bind(now)
    .bind(source)
    .bind(question_id)
    .bind(QuestionStatus::Draft)
    .bind(QuestionStatus::Approved)
    .bind(QuestionStatus::AdminReview)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn release_to_draft(
    pool: &PgPool,
    source: QuestionSource,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE questions
         SET status = $1, updated_at = $2
         WHERE source = $3 AND id = $4 AND status = $5",
    )
    .bind(QuestionStatus::Draft)
    .bind(now)
    .bind(source)
    .bind(question_id)
    .bind(QuestionStatus::Analyzing)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn transition_status(
    pool: &PgPool,
    source: QuestionSource,
    question_id: &str,
    from: &[QuestionStatus],
    to: QuestionStatus,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    if from.is_empty() {
        return Ok(false);
    }

    let mut builder = QueryBuilder::<Postgres>::new("UPDATE questions SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE source = ");
    builder.push_bind(source);
    builder.push(" AND id = ");
    builder.push_bind(question_id);
    builder.push(" AND status IN (");

    let mut separated = builder.separated(", ");
    for status in from {
        separated.push_bind(*status);
    }
    builder.push(")");

    let updated = builder.build().execute(pool).await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn statuses_by_assessment(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Vec<QuestionStatus>, sqlx::Error> {
    sqlx::query_scalar::<_, QuestionStatus>(
        "SELECT status FROM questions WHERE assessment_id = $1",
    )
    .bind(assessment_id)
    .fetch_all(pool)
    .await
}
