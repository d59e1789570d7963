use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tripnest_core::repository::{NotificationRepository, RepoResult};
use tripnest_core::{Notification, RepoError};
use tripnest_shared::PageRequest;
use uuid::Uuid;

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, title, message, kind, link, read, metadata, created_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    sender_id: Option<Uuid>,
    title: String,
    message: String,
    kind: String,
    link: Option<String>,
    read: bool,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepoError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            sender_id: row.sender_id,
            title: row.title,
            message: row.message,
            kind: row.kind.parse()?,
            link: row.link,
            read: row.read,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &Notification) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, sender_id, title, message, kind, link, read, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.sender_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(&notification.link)
        .bind(notification.read)
        .bind(&notification.metadata)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        recipient: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> RepoResult<(Vec<Notification>, u64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND (NOT $2 OR read = FALSE)",
        )
        .bind(recipient)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications \
             WHERE recipient_id = $1 AND (NOT $2 OR read = FALSE) \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4",
            NOTIFICATION_COLUMNS
        ))
        .bind(recipient)
        .bind(unread_only)
        .bind(i64::from(page.limit))
        .bind(i64::try_from(page.offset())?)
        .fetch_all(&self.pool)
        .await?;

        let notifications = rows
            .into_iter()
            .map(Notification::try_from)
            .collect::<RepoResult<Vec<_>>>()?;

        Ok((notifications, u64::try_from(total)?))
    }

    async fn count_unread(&self, recipient: Uuid) -> RepoResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count)?)
    }

    async fn mark_read(&self, id: Uuid, recipient: Uuid) -> RepoResult<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND recipient_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn mark_all_read(&self, recipient: Uuid) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid, recipient: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, recipient: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(recipient)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
