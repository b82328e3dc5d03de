use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Assessment;

pub(crate) const COLUMNS: &str = "\
    id, kind, class_id, teacher_id, title, is_active, pending_publish, published_at, \
    created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {COLUMNS} FROM assessments WHERE id = $1"
    ))
    .bind(assessment_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_pending_publish(
    pool: &PgPool,
    assessment_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assessments
         SET pending_publish = TRUE, updated_at = $2
         WHERE id = $1 AND is_active = FALSE AND pending_publish = FALSE",
    )
    .bind(assessment_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// The publish transition. The predicate on `pending_publish` makes the
/// update the arbiter under concurrent callers: exactly one caller changes
/// a row, everyone else sees zero rows affected. Never replace this with a
/// read-then-write, and never guard it with an in-process lock; other
/// process instances race on the same row.
pub(crate) async fn activate_if_pending(
    pool: &PgPool,
    assessment_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE assessments
         SET is_active = TRUE, pending_publish = FALSE, published_at = $2, updated_at = $2
         WHERE id = $1 AND pending_publish = TRUE",
    )
    .bind(assessment_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}
