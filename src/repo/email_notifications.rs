use super::{map_insert_error, now_rfc3339, parse_timestamp};
use crate::db::Db;
use crate::entities::{EmailNotification, NotificationStatus};
use crate::error::{ChurnError, Result};
use crate::ingest::BatchStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

/// SQLite-backed storage for email notifications.
pub struct EmailNotificationRepo {
    db: Db,
}

const COLUMNS: &str = "id, email, name, issue, status, created_at, updated_at, sent_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<EmailNotification> {
    let status: String = row.get("status")?;
    Ok(EmailNotification {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        issue: row.get("issue")?,
        status: NotificationStatus::parse(&status).unwrap_or_default(),
        created_at: parse_timestamp(row.get("created_at")?),
        updated_at: parse_timestamp(row.get("updated_at")?),
        sent_at: parse_timestamp(row.get("sent_at")?),
    })
}

impl EmailNotificationRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<EmailNotification>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM email_notifications ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let notifications = stmt
                    .query_map([], notification_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(notifications)
            })
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<EmailNotification>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM email_notifications WHERE id = ?1",
                    COLUMNS
                ))?;
                let mut rows = stmt.query_map(params![id], notification_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    pub async fn get_by_status(
        &self,
        status: NotificationStatus,
    ) -> Result<Vec<EmailNotification>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM email_notifications WHERE status = ?1 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let notifications = stmt
                    .query_map(params![status.as_str()], notification_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(notifications)
            })
            .await
    }

    pub async fn create(&self, mut notification: EmailNotification) -> Result<EmailNotification> {
        self.db
            .with_connection(move |conn| {
                let now = now_rfc3339();
                conn.execute(
                    "INSERT INTO email_notifications (email, name, issue, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        notification.email,
                        notification.name,
                        notification.issue,
                        notification.status.as_str(),
                        now,
                    ],
                )
                .map_err(map_insert_error)?;
                notification.id = Some(conn.last_insert_rowid());
                notification.created_at = parse_timestamp(Some(now));
                Ok(notification)
            })
            .await
    }

    /// Replace the mutable fields of the notification with the given id.
    pub async fn update(
        &self,
        id: i64,
        notification: EmailNotification,
    ) -> Result<Option<EmailNotification>> {
        let updated = self
            .db
            .with_connection(move |conn| {
                let count = conn.execute(
                    "UPDATE email_notifications SET email = ?1, name = ?2, issue = ?3, status = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        notification.email,
                        notification.name,
                        notification.issue,
                        notification.status.as_str(),
                        now_rfc3339(),
                        id,
                    ],
                )?;
                Ok::<_, ChurnError>(count > 0)
            })
            .await?;

        if !updated {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Advance the delivery status; records `sent_at` when provided.
    pub async fn update_status(
        &self,
        id: i64,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE email_notifications SET status = ?1, updated_at = ?2, sent_at = COALESCE(?3, sent_at)
                     WHERE id = ?4",
                    params![
                        status.as_str(),
                        now_rfc3339(),
                        sent_at.map(|t| t.to_rfc3339()),
                        id,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM email_notifications WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
    }
}

#[async_trait]
impl BatchStore<EmailNotification> for EmailNotificationRepo {
    async fn batch_create(
        &self,
        records: Vec<EmailNotification>,
    ) -> Result<Vec<EmailNotification>> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let now = now_rfc3339();
                let mut created = Vec::with_capacity(records.len());
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO email_notifications (email, name, issue, status, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for mut notification in records {
                        stmt.execute(params![
                            notification.email,
                            notification.name,
                            notification.issue,
                            notification.status.as_str(),
                            now,
                        ])
                        .map_err(map_insert_error)?;
                        notification.id = Some(tx.last_insert_rowid());
                        notification.created_at = parse_timestamp(Some(now.clone()));
                        created.push(notification);
                    }
                }
                tx.commit()?;
                Ok::<_, ChurnError>(created)
            })
            .await
    }
}
