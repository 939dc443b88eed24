use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::notification_models::{NewNotification, Notification};
use crate::error::Result;

/// Per-user notification feed.
///
/// Every read and mutation is scoped by `user_id`; touching another user's
/// rows is a no-op.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest first.
    async fn list(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;

    /// True iff the notification exists and belongs to `user_id`.
    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64>;

    async fn clear(&self, user_id: Uuid) -> Result<u64>;

    /// Insert-or-ignore keyed on the source event id. `None` means the event
    /// was already materialized.
    async fn insert_event_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>>;

    /// Inserts a batch of reminders in one transaction, skipping any that
    /// already exist for the same (user, type, entity). Returns rows created.
    async fn insert_reminders(&self, reminders: Vec<NewNotification>) -> Result<u64>;
}

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_OR_IGNORE: &str =
    "INSERT INTO notifications (user_id, type, title, body, entity_type, entity_id, source_event_id)
     VALUES ($1, $2, $3, $4, $5, $6, $7)
     ON CONFLICT DO NOTHING
     RETURNING *";

fn bind_new<'q>(
    query: sqlx::query::QueryAs<'q, Postgres, Notification, sqlx::postgres::PgArguments>,
    notification: &'q NewNotification,
) -> sqlx::query::QueryAs<'q, Postgres, Notification, sqlx::postgres::PgArguments> {
    query
        .bind(notification.user_id)
        .bind(notification.notification_type.as_str())
        .bind(notification.title.as_str())
        .bind(notification.body.as_deref())
        .bind(notification.entity_type.as_str())
        .bind(notification.entity_id)
        .bind(notification.source_event_id)
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn list(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, updated_at = NOW()
             WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_event_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>> {
        let inserted = bind_new(sqlx::query_as::<_, Notification>(INSERT_OR_IGNORE), &notification)
            .fetch_optional(&self.pool)
            .await?;

        Ok(inserted)
    }

    async fn insert_reminders(&self, reminders: Vec<NewNotification>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut created = 0;

        for reminder in &reminders {
            let inserted = bind_new(sqlx::query_as::<_, Notification>(INSERT_OR_IGNORE), reminder)
                .fetch_optional(&mut *tx)
                .await?;
            if inserted.is_some() {
                created += 1;
            }
        }

        tx.commit().await?;
        Ok(created)
    }
}
