use sqlx::PgPool;

/// Students enrolled in a class for the active term, for notification
/// fan-out on publish.
pub(crate) async fn active_student_ids(
    pool: &PgPool,
    class_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT student_id FROM enrollments WHERE class_id = $1 AND is_active = TRUE",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
}
