use super::{csv_report_response, read_csv_upload, ApiError, ApiResult, AppState};
use crate::entities::customer_issue::DEFAULT_ISSUE_STATUS;
use crate::entities::CustomerIssue;
use crate::error::ChurnError;
use crate::ingest::{import_csv, CustomerIssueCsv};
use axum::{
    extract::{Multipart, Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/upload-csv", post(upload_csv))
        .route("/customer/:customer_id", get(list_by_customer))
        .route(
            "/:customer_id/:incident_title",
            axum::routing::put(update).delete(delete),
        )
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<CustomerIssue>>> {
    Ok(Json(state.issues.get_all().await?))
}

async fn list_by_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<f64>,
) -> ApiResult<Json<Vec<CustomerIssue>>> {
    Ok(Json(state.issues.get_by_customer_id(customer_id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(issue): Json<CustomerIssue>,
) -> ApiResult<Json<CustomerIssue>> {
    Ok(Json(state.issues.create(issue).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateCustomerIssue {
    customer_id: Option<f64>,
    code_contrat: Option<f64>,
    client_type: Option<f64>,
    client_region: Option<f64>,
    client_categorie: Option<f64>,
    incident_title: Option<String>,
    churn_risk: Option<f64>,
    status: Option<String>,
}

async fn update(
    State(state): State<AppState>,
    Path((customer_id, incident_title)): Path<(f64, String)>,
    Json(dto): Json<UpdateCustomerIssue>,
) -> ApiResult<Json<serde_json::Value>> {
    let replacement = CustomerIssue {
        customer_id: dto.customer_id.or(Some(customer_id)),
        code_contrat: dto.code_contrat,
        client_type: dto.client_type,
        client_region: dto.client_region,
        client_categorie: dto.client_categorie,
        incident_title: dto.incident_title.or_else(|| Some(incident_title.clone())),
        churn_risk: dto.churn_risk,
        status: dto.status.unwrap_or_else(|| DEFAULT_ISSUE_STATUS.to_string()),
    };

    let updated = state
        .issues
        .update_by_customer_and_title(customer_id, incident_title, replacement)
        .await?;
    if !updated {
        return Err(ApiError(ChurnError::NotFound(
            "Customer issue not found".to_string(),
        )));
    }
    Ok(Json(serde_json::json!({
        "message": "Customer issue updated successfully"
    })))
}

async fn delete(
    State(state): State<AppState>,
    Path((customer_id, incident_title)): Path<(f64, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state
        .issues
        .delete_by_customer_and_title(customer_id, incident_title)
        .await?;
    if !deleted {
        return Err(ApiError(ChurnError::NotFound(
            "Customer issue not found".to_string(),
        )));
    }
    Ok(Json(serde_json::json!({
        "message": "Customer issue deleted successfully"
    })))
}

async fn upload_csv(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let content = match read_csv_upload(&mut multipart).await {
        Ok(content) => content,
        Err(rejection) => return rejection,
    };
    let report = import_csv(&CustomerIssueCsv, state.issues.as_ref(), &content).await;
    csv_report_response(report)
}
