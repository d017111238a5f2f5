use super::{ApiError, ApiResult, AppState};
use crate::entities::Note;
use crate::error::ChurnError;
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_by_id).put(update).delete(delete))
        .route("/:id/read", patch(mark_read))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    recipient: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Vec<Note>>> {
    let notes = match filter.recipient {
        Some(role) => state.notes.get_by_recipient(role).await?,
        None => state.notes.get_all().await?,
    };
    Ok(Json(notes))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Note>> {
    let note = state
        .notes
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Note not found".to_string())))?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
struct CreateNote {
    title: String,
    description: String,
    sender_id: String,
    #[serde(default)]
    recipients: Vec<String>,
}

async fn create(State(state): State<AppState>, Json(dto): Json<CreateNote>) -> ApiResult<Json<Note>> {
    let note = Note {
        id: String::new(),
        title: dto.title,
        description: dto.description,
        sender_id: dto.sender_id,
        recipients: dto.recipients,
        is_read: false,
        timestamp: None,
    };
    Ok(Json(state.notes.create(note).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateNote {
    title: Option<String>,
    description: Option<String>,
    recipients: Option<Vec<String>>,
    is_read: Option<bool>,
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateNote>,
) -> ApiResult<Json<Note>> {
    let mut existing = state
        .notes
        .get_by_id(id.clone())
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Note not found".to_string())))?;

    if let Some(title) = dto.title {
        existing.title = title;
    }
    if let Some(description) = dto.description {
        existing.description = description;
    }
    if let Some(recipients) = dto.recipients {
        existing.recipients = recipients;
    }
    if let Some(is_read) = dto.is_read {
        existing.is_read = is_read;
    }

    let updated = state
        .notes
        .update(id, existing)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Note not found".to_string())))?;
    Ok(Json(updated))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.notes.mark_read(id).await? {
        return Err(ApiError(ChurnError::NotFound("Note not found".to_string())));
    }
    Ok(Json(serde_json::json!({"message": "Note marked as read"})))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.notes.delete(id).await? {
        return Err(ApiError(ChurnError::NotFound("Note not found".to_string())));
    }
    Ok(Json(serde_json::json!({"message": "Note deleted successfully"})))
}
