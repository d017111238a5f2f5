use super::EmailTransport;
use crate::entities::{EmailNotification, NotificationStatus};
use crate::error::Result;
use crate::repo::EmailNotificationRepo;
use chrono::Utc;
use serde::Serialize;

/// Outcome of one send run.
#[derive(Debug, Clone, Serialize)]
pub struct EmailSendReport {
    pub success: bool,
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Deliver queued notifications.
///
/// With explicit `notification_ids`, only those are considered and non-pending
/// ones are skipped unless `force_resend`. Without ids, every pending
/// notification goes out. Each message transitions
/// `pending → sending → sent|failed`; one failed delivery never stops the run.
pub async fn send_notifications(
    repo: &EmailNotificationRepo,
    transport: &dyn EmailTransport,
    notification_ids: Option<Vec<i64>>,
    force_resend: bool,
) -> EmailSendReport {
    let targets = match collect_targets(repo, notification_ids, force_resend).await {
        Ok(targets) => targets,
        Err(e) => {
            log::error!("Failed to collect notifications to send: {}", e);
            return EmailSendReport {
                success: false,
                message: format!("Error sending emails: {}", e),
                sent_count: 0,
                failed_count: 0,
                errors: Some(vec![e.to_string()]),
            };
        }
    };

    if targets.is_empty() {
        return EmailSendReport {
            success: true,
            message: "No notifications to send".to_string(),
            sent_count: 0,
            failed_count: 0,
            errors: None,
        };
    }

    let mut sent_count = 0;
    let mut failed_count = 0;
    let mut errors = Vec::new();

    for notification in targets {
        let id = match notification.id {
            Some(id) => id,
            None => continue,
        };

        if let Err(e) = repo
            .update_status(id, NotificationStatus::Sending, None)
            .await
        {
            failed_count += 1;
            errors.push(format!("ID {}: {}", id, e));
            continue;
        }

        match transport
            .send(&notification.email, &notification.name, &notification.issue)
            .await
        {
            Ok(()) => {
                // best effort: a failed status write should not undo a delivery
                let _ = repo
                    .update_status(id, NotificationStatus::Sent, Some(Utc::now()))
                    .await;
                sent_count += 1;
            }
            Err(e) => {
                let _ = repo.update_status(id, NotificationStatus::Failed, None).await;
                failed_count += 1;
                errors.push(format!("ID {}: {}", id, e));
            }
        }
    }

    let mut message = format!("Sent {} emails successfully", sent_count);
    if failed_count > 0 {
        message.push_str(&format!(", {} failed", failed_count));
    }

    EmailSendReport {
        success: failed_count == 0,
        message,
        sent_count,
        failed_count,
        errors: if errors.is_empty() { None } else { Some(errors) },
    }
}

async fn collect_targets(
    repo: &EmailNotificationRepo,
    notification_ids: Option<Vec<i64>>,
    force_resend: bool,
) -> Result<Vec<EmailNotification>> {
    match notification_ids {
        Some(ids) => {
            let mut targets = Vec::new();
            for id in ids {
                if let Some(notification) = repo.get_by_id(id).await? {
                    if notification.status == NotificationStatus::Pending || force_resend {
                        targets.push(notification);
                    }
                }
            }
            Ok(targets)
        }
        None => repo.get_by_status(NotificationStatus::Pending).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::LogMailer;
    use crate::error::ChurnError;
    use crate::repo::test_util::test_db;
    use async_trait::async_trait;

    struct FlakyTransport;

    #[async_trait]
    impl EmailTransport for FlakyTransport {
        async fn send(&self, to_email: &str, _to_name: &str, _issue: &str) -> Result<()> {
            if to_email.starts_with("bad") {
                return Err(ChurnError::Email(format!("rejected recipient {}", to_email)));
            }
            Ok(())
        }
    }

    fn notification(email: &str) -> EmailNotification {
        EmailNotification {
            id: None,
            email: email.to_string(),
            name: "Amal".to_string(),
            issue: "Slow connection".to_string(),
            status: NotificationStatus::Pending,
            created_at: None,
            updated_at: None,
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_send_all_pending() {
        let (db, _tmp) = test_db().await;
        let repo = EmailNotificationRepo::new(db);
        repo.create(notification("a@example.com")).await.unwrap();
        repo.create(notification("b@example.com")).await.unwrap();

        let report = send_notifications(&repo, &LogMailer, None, false).await;
        assert!(report.success);
        assert_eq!(report.sent_count, 2);
        assert_eq!(report.failed_count, 0);

        let sent = repo.get_by_status(NotificationStatus::Sent).await.unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|n| n.sent_at.is_some()));
    }

    #[tokio::test]
    async fn test_partial_failure_marks_failed() {
        let (db, _tmp) = test_db().await;
        let repo = EmailNotificationRepo::new(db);
        repo.create(notification("good@example.com")).await.unwrap();
        repo.create(notification("bad@example.com")).await.unwrap();

        let report = send_notifications(&repo, &FlakyTransport, None, false).await;
        assert!(!report.success);
        assert_eq!(report.sent_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.message, "Sent 1 emails successfully, 1 failed");
        assert!(report.errors.unwrap()[0].contains("bad@example.com"));

        let failed = repo.get_by_status(NotificationStatus::Failed).await.unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_ids_skip_sent_unless_forced() {
        let (db, _tmp) = test_db().await;
        let repo = EmailNotificationRepo::new(db);
        let created = repo.create(notification("a@example.com")).await.unwrap();
        let id = created.id.unwrap();
        repo.update_status(id, NotificationStatus::Sent, Some(Utc::now()))
            .await
            .unwrap();

        let report = send_notifications(&repo, &LogMailer, Some(vec![id]), false).await;
        assert_eq!(report.sent_count, 0);
        assert_eq!(report.message, "No notifications to send");

        let report = send_notifications(&repo, &LogMailer, Some(vec![id]), true).await;
        assert_eq!(report.sent_count, 1);
    }
}
