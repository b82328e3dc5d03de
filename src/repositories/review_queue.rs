use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::types::{QuestionSource, QuestionStatus};

/// One row of the admin review feed: a pending question joined with its
/// most recent verdict's stamped routing outcome.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ReviewQueueEntry {
    pub(crate) question_id: String,
    pub(crate) source: QuestionSource,
    pub(crate) teacher_id: String,
    pub(crate) subject: String,
    pub(crate) grade_band: String,
    pub(crate) content: String,
    pub(crate) status: QuestionStatus,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) verdict_id: Option<String>,
    pub(crate) review_priority: Option<i32>,
    pub(crate) routing_reasons: Option<Json<Vec<String>>>,
    pub(crate) bloom_level: Option<i16>,
    pub(crate) clarity_score: Option<f64>,
    pub(crate) verdict_created_at: Option<PrimitiveDateTime>,
}

pub(crate) async fn list(
    pool: &PgPool,
    status: QuestionStatus,
    skip: i64,
    limit: i64,
) -> Result<Vec<ReviewQueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, ReviewQueueEntry>(
        "SELECT q.id AS question_id,
                q.source,
                q.teacher_id,
                q.subject,
                q.grade_band,
                q.content,
                q.status,
                q.updated_at,
                v.id AS verdict_id,
                v.review_priority,
                v.routing_reasons,
                v.bloom_level,
                v.clarity_score,
                v.created_at AS verdict_created_at
         FROM questions q
         LEFT JOIN LATERAL (
             SELECT id, review_priority, routing_reasons, bloom_level, clarity_score, created_at
             FROM quality_verdicts
             WHERE source = q.source AND question_id = q.id
             ORDER BY created_at DESC
             LIMIT 1
         ) v ON TRUE
         WHERE q.status = $1
         ORDER BY COALESCE(v.review_priority, 0) ASC,
                  COALESCE(v.created_at, q.updated_at) DESC
         OFFSET $2 LIMIT $3",
    )
    .bind(status)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 500))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(pool: &PgPool, status: QuestionStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
}
