use super::{csv_report_response, read_csv_upload, ApiError, ApiResult, AppState};
use crate::entities::{CustomerIncidentPrediction, IncidentType};
use crate::error::ChurnError;
use crate::ingest::{import_csv, PredictionCsv};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/upload-csv", post(upload_csv))
        .route("/high-risk", get(high_risk))
        .route("/customer/:customer_id", get(get_by_customer))
        .route("/:id", get(get_by_id).put(update).delete(delete))
}

/// Prediction plus its derived risk figures
#[derive(Debug, Serialize)]
struct PredictionView {
    #[serde(flatten)]
    prediction: CustomerIncidentPrediction,
    avg_risk_percentage: f64,
    risk_level: &'static str,
}

impl From<CustomerIncidentPrediction> for PredictionView {
    fn from(prediction: CustomerIncidentPrediction) -> Self {
        let avg_risk_percentage = prediction.average_risk_percentage();
        let risk_level = prediction.risk_level();
        Self {
            prediction,
            avg_risk_percentage,
            risk_level,
        }
    }
}

fn views(predictions: Vec<CustomerIncidentPrediction>) -> Vec<PredictionView> {
    predictions.into_iter().map(PredictionView::from).collect()
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    region: Option<String>,
    incident_type: Option<IncidentType>,
    min_risk: Option<f64>,
}

/// List predictions with at most one filter applied, in precedence order:
/// region, incident type, minimum averaged risk.
async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Vec<PredictionView>>> {
    let predictions = if let Some(region) = filter.region {
        state.predictions.get_by_region(region).await?
    } else if let Some(incident_type) = filter.incident_type {
        state.predictions.get_by_incident_type(incident_type).await?
    } else if let Some(min_risk) = filter.min_risk {
        state.predictions.get_by_min_risk(min_risk).await?
    } else {
        state.predictions.get_all().await?
    };
    Ok(Json(views(predictions)))
}

#[derive(Debug, Deserialize)]
struct HighRiskQuery {
    #[serde(default = "default_min_risk")]
    min_risk: f64,
}

fn default_min_risk() -> f64 {
    60.0
}

async fn high_risk(
    State(state): State<AppState>,
    Query(query): Query<HighRiskQuery>,
) -> ApiResult<Json<Vec<PredictionView>>> {
    Ok(Json(views(
        state.predictions.get_by_min_risk(query.min_risk).await?,
    )))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PredictionView>> {
    let prediction = state.predictions.get_by_id(id).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Customer incident prediction not found".to_string(),
        ))
    })?;
    Ok(Json(prediction.into()))
}

async fn get_by_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<PredictionView>> {
    let prediction = state
        .predictions
        .get_by_customer_id(customer_id)
        .await?
        .ok_or_else(|| {
            ApiError(ChurnError::NotFound(
                "Customer incident prediction not found".to_string(),
            ))
        })?;
    Ok(Json(prediction.into()))
}

#[derive(Debug, Deserialize)]
struct CreatePrediction {
    customer_id: String,
    client_region: String,
    client_type: String,
    #[serde(default)]
    client_category: Option<f64>,
    #[serde(default)]
    q1_prediction: f64,
    #[serde(default)]
    q2_prediction: f64,
    #[serde(default)]
    q3_prediction: f64,
    #[serde(default)]
    q4_prediction: f64,
    most_likely_incident: IncidentType,
    recommendation: String,
}

async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreatePrediction>,
) -> ApiResult<Json<PredictionView>> {
    let prediction = CustomerIncidentPrediction {
        id: None,
        customer_id: dto.customer_id,
        client_region: dto.client_region,
        client_type: dto.client_type,
        client_category: dto.client_category,
        q1_prediction: dto.q1_prediction,
        q2_prediction: dto.q2_prediction,
        q3_prediction: dto.q3_prediction,
        q4_prediction: dto.q4_prediction,
        most_likely_incident: dto.most_likely_incident,
        recommendation: dto.recommendation,
        created_at: None,
        updated_at: None,
    };

    let created = state.predictions.create(prediction).await.map_err(|e| {
        if e.is_conflict() {
            ChurnError::Conflict(
                "Customer ID already exists. Each customer_id must be unique.".to_string(),
            )
        } else {
            e
        }
    })?;
    Ok(Json(created.into()))
}

#[derive(Debug, Deserialize)]
struct UpdatePrediction {
    customer_id: Option<String>,
    client_region: Option<String>,
    client_type: Option<String>,
    client_category: Option<f64>,
    q1_prediction: Option<f64>,
    q2_prediction: Option<f64>,
    q3_prediction: Option<f64>,
    q4_prediction: Option<f64>,
    most_likely_incident: Option<IncidentType>,
    recommendation: Option<String>,
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(dto): Json<UpdatePrediction>,
) -> ApiResult<Json<PredictionView>> {
    let mut existing = state.predictions.get_by_id(id).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Customer incident prediction not found".to_string(),
        ))
    })?;

    if let Some(customer_id) = dto.customer_id {
        existing.customer_id = customer_id;
    }
    if let Some(client_region) = dto.client_region {
        existing.client_region = client_region;
    }
    if let Some(client_type) = dto.client_type {
        existing.client_type = client_type;
    }
    if let Some(client_category) = dto.client_category {
        existing.client_category = Some(client_category);
    }
    if let Some(q1) = dto.q1_prediction {
        existing.q1_prediction = q1;
    }
    if let Some(q2) = dto.q2_prediction {
        existing.q2_prediction = q2;
    }
    if let Some(q3) = dto.q3_prediction {
        existing.q3_prediction = q3;
    }
    if let Some(q4) = dto.q4_prediction {
        existing.q4_prediction = q4;
    }
    if let Some(incident) = dto.most_likely_incident {
        existing.most_likely_incident = incident;
    }
    if let Some(recommendation) = dto.recommendation {
        existing.recommendation = recommendation;
    }

    let updated = state.predictions.update(id, existing).await?.ok_or_else(|| {
        ApiError(ChurnError::NotFound(
            "Customer incident prediction not found".to_string(),
        ))
    })?;
    Ok(Json(updated.into()))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.predictions.delete(id).await? {
        return Err(ApiError(ChurnError::NotFound(
            "Customer incident prediction not found".to_string(),
        )));
    }
    Ok(Json(serde_json::json!({
        "message": "Customer incident prediction deleted successfully"
    })))
}

async fn upload_csv(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let content = match read_csv_upload(&mut multipart).await {
        Ok(content) => content,
        Err(rejection) => return rejection,
    };
    let report = import_csv(&PredictionCsv, state.predictions.as_ref(), &content).await;
    csv_report_response(report)
}
