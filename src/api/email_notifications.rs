use super::{csv_report_response, read_csv_upload, ApiError, ApiResult, AppState};
use crate::email::{send_notifications, EmailSendReport};
use crate::entities::{EmailNotification, NotificationStatus};
use crate::error::ChurnError;
use crate::ingest::{import_csv, EmailNotificationCsv};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/upload-csv", post(upload_csv))
        .route("/send", post(send))
        .route("/:id", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    status: Option<NotificationStatus>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Vec<EmailNotification>>> {
    let notifications = match filter.status {
        Some(status) => state.notifications.get_by_status(status).await?,
        None => state.notifications.get_all().await?,
    };
    Ok(Json(notifications))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EmailNotification>> {
    let notification = state.notifications.get_by_id(id).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Email notification not found".to_string(),
        ))
    })?;
    Ok(Json(notification))
}

#[derive(Debug, Deserialize)]
struct CreateNotification {
    email: String,
    name: String,
    issue: String,
    #[serde(default)]
    status: NotificationStatus,
}

async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreateNotification>,
) -> ApiResult<Json<EmailNotification>> {
    let notification = EmailNotification {
        id: None,
        email: dto.email,
        name: dto.name,
        issue: dto.issue,
        status: dto.status,
        created_at: None,
        updated_at: None,
        sent_at: None,
    };
    Ok(Json(state.notifications.create(notification).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateNotification {
    email: Option<String>,
    name: Option<String>,
    issue: Option<String>,
    status: Option<NotificationStatus>,
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(dto): Json<UpdateNotification>,
) -> ApiResult<Json<EmailNotification>> {
    let mut existing = state.notifications.get_by_id(id).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Email notification not found".to_string(),
        ))
    })?;

    if let Some(email) = dto.email {
        existing.email = email;
    }
    if let Some(name) = dto.name {
        existing.name = name;
    }
    if let Some(issue) = dto.issue {
        existing.issue = issue;
    }
    if let Some(status) = dto.status {
        existing.status = status;
    }

    let updated = state.notifications.update(id, existing).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Email notification not found".to_string(),
        ))
    })?;
    Ok(Json(updated))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.notifications.delete(id).await? {
        return Err(ApiError(ChurnError::NotFound(
            "Email notification not found".to_string(),
        )));
    }
    Ok(Json(serde_json::json!({
        "message": "Email notification deleted successfully"
    })))
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    notification_ids: Option<Vec<i64>>,
    #[serde(default)]
    force_resend: bool,
}

/// Deliver queued notifications; the report carries per-message failures.
async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Json<EmailSendReport> {
    let report = send_notifications(
        state.notifications.as_ref(),
        state.mailer.as_ref(),
        request.notification_ids,
        request.force_resend,
    )
    .await;
    Json(report)
}

async fn upload_csv(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let content = match read_csv_upload(&mut multipart).await {
        Ok(content) => content,
        Err(rejection) => return rejection,
    };
    let report = import_csv(&EmailNotificationCsv, state.notifications.as_ref(), &content).await;
    csv_report_response(report)
}
