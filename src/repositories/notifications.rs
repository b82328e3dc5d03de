use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::types::NotificationKind;

/// One notification tuple handed to the delivery collaborator. How it is
/// delivered (push, in-app, email) is not this subsystem's concern.
#[derive(Debug, Clone)]
pub(crate) struct NewNotification {
    pub(crate) id: String,
    pub(crate) recipient_id: String,
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) link: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert_many(
    pool: &PgPool,
    notifications: Vec<NewNotification>,
) -> Result<(), sqlx::Error> {
    if notifications.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for notification in notifications {
        sqlx::query(
            "INSERT INTO notifications (id, recipient_id, kind, title, body, link, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.link)
        .bind(notification.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}
