use sqlx::PgPool;

use crate::db::types::UserRole;

pub(crate) async fn admin_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE role = $1")
        .bind(UserRole::Admin)
        .fetch_all(pool)
        .await
}
