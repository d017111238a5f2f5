use super::{ApiError, ApiResult, AppState};
use crate::entities::{User, UserRole};
use crate::error::ChurnError;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_by_id).put(update).delete(delete))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.users.get_all().await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state
        .users
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("User not found".to_string())))?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    email: String,
    full_name: String,
    role: UserRole,
    /// Already-hashed credential issued by the identity service
    password_hash: String,
}

async fn create(State(state): State<AppState>, Json(dto): Json<CreateUser>) -> ApiResult<Json<User>> {
    let user = User {
        id: String::new(),
        email: dto.email,
        full_name: dto.full_name,
        role: dto.role,
        password_hash: dto.password_hash,
        created_at: None,
        updated_at: None,
    };

    let created = state.users.create(user).await.map_err(|e| {
        if e.is_conflict() {
            ChurnError::Conflict("Email already exists. Each email must be unique.".to_string())
        } else {
            e
        }
    })?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
struct UpdateUser {
    email: Option<String>,
    full_name: Option<String>,
    role: Option<UserRole>,
    password_hash: Option<String>,
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateUser>,
) -> ApiResult<Json<User>> {
    let mut existing = state
        .users
        .get_by_id(id.clone())
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("User not found".to_string())))?;

    if let Some(email) = dto.email {
        existing.email = email;
    }
    if let Some(full_name) = dto.full_name {
        existing.full_name = full_name;
    }
    if let Some(role) = dto.role {
        existing.role = role;
    }
    if let Some(password_hash) = dto.password_hash {
        existing.password_hash = password_hash;
    }

    let updated = state
        .users
        .update(id, existing)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("User not found".to_string())))?;
    Ok(Json(updated))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.users.delete(id).await? {
        return Err(ApiError(ChurnError::NotFound("User not found".to_string())));
    }
    Ok(Json(serde_json::json!({"message": "User deleted successfully"})))
}
