use super::{ApiError, ApiResult, AppState};
use crate::entities::{Client, Contact};
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

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(state.clients.get_all().await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Client>> {
    let client = state
        .clients
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Client not found".to_string())))?;
    Ok(Json(client))
}

#[derive(Debug, Deserialize)]
struct CreateClient {
    name: String,
    segment: String,
    since: String,
    churn_risk: String,
    contacts: Contact,
    #[serde(default)]
    monthly_revenue: Option<f64>,
    #[serde(default)]
    churn_trend: Option<String>,
    #[serde(default)]
    churn_trend_days: Option<i64>,
}

async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreateClient>,
) -> ApiResult<Json<Client>> {
    let client = Client {
        id: String::new(),
        name: dto.name,
        segment: dto.segment,
        since: dto.since,
        churn_risk: dto.churn_risk,
        contacts: dto.contacts,
        monthly_revenue: dto.monthly_revenue,
        churn_trend: dto.churn_trend,
        churn_trend_days: dto.churn_trend_days,
        created_at: None,
        updated_at: None,
    };
    Ok(Json(state.clients.create(client).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateClient {
    name: Option<String>,
    segment: Option<String>,
    since: Option<String>,
    churn_risk: Option<String>,
    contacts: Option<Contact>,
    monthly_revenue: Option<f64>,
    churn_trend: Option<String>,
    churn_trend_days: Option<i64>,
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateClient>,
) -> ApiResult<Json<Client>> {
    let mut existing = state
        .clients
        .get_by_id(id.clone())
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Client not found".to_string())))?;

    if let Some(name) = dto.name {
        existing.name = name;
    }
    if let Some(segment) = dto.segment {
        existing.segment = segment;
    }
    if let Some(since) = dto.since {
        existing.since = since;
    }
    if let Some(churn_risk) = dto.churn_risk {
        existing.churn_risk = churn_risk;
    }
    if let Some(contacts) = dto.contacts {
        existing.contacts = contacts;
    }
    if let Some(monthly_revenue) = dto.monthly_revenue {
        existing.monthly_revenue = Some(monthly_revenue);
    }
    if let Some(churn_trend) = dto.churn_trend {
        existing.churn_trend = Some(churn_trend);
    }
    if let Some(churn_trend_days) = dto.churn_trend_days {
        existing.churn_trend_days = Some(churn_trend_days);
    }

    let updated = state
        .clients
        .update(id, existing)
        .await?
        .ok_or_else(|| ApiError(ChurnError::NotFound("Client not found".to_string())))?;
    Ok(Json(updated))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.clients.delete(id).await? {
        return Err(ApiError(ChurnError::NotFound("Client not found".to_string())));
    }
    Ok(Json(serde_json::json!({
        "message": "Client deleted successfully"
    })))
}
