pub mod clients;
pub mod customer_issues;
pub mod email_notifications;
pub mod notes;
pub mod predictions;
pub mod users;

use crate::config::Config;
use crate::db::Db;
use crate::email::EmailTransport;
use crate::error::{ChurnError, Result};
use crate::ingest::CsvImportReport;
use crate::repo::{
    ClientRepo, CustomerIssueRepo, EmailNotificationRepo, NoteRepo, PredictionRepo, UserRepo,
};
use axum::{
    extract::{Multipart, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// Everything is constructed once at startup and injected; handlers never
/// reach for globals.
#[derive(Clone)]
pub struct AppState {
    pub issues: Arc<CustomerIssueRepo>,
    pub predictions: Arc<PredictionRepo>,
    pub notifications: Arc<EmailNotificationRepo>,
    pub clients: Arc<ClientRepo>,
    pub notes: Arc<NoteRepo>,
    pub users: Arc<UserRepo>,
    pub mailer: Arc<dyn EmailTransport>,
    api_key: String,
    authless: bool,
}

impl AppState {
    pub fn new(db: Db, mailer: Arc<dyn EmailTransport>, api_key: String, authless: bool) -> Self {
        Self {
            issues: Arc::new(CustomerIssueRepo::new(db.clone())),
            predictions: Arc::new(PredictionRepo::new(db.clone())),
            notifications: Arc::new(EmailNotificationRepo::new(db.clone())),
            clients: Arc::new(ClientRepo::new(db.clone())),
            notes: Arc::new(NoteRepo::new(db.clone())),
            users: Arc::new(UserRepo::new(db)),
            mailer,
            api_key,
            authless,
        }
    }
}

/// HTTP API server
pub struct HttpServer {
    state: AppState,
    port: u16,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    pub fn new(config: &Config, db: Db, mailer: Arc<dyn EmailTransport>) -> Result<Self> {
        // API key is optional in authless mode
        let api_key = if config.server.authless {
            String::new()
        } else {
            std::env::var(&config.server.api_key_env).map_err(|_| {
                ChurnError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or enable server.authless.",
                    config.server.api_key_env
                ))
            })?
        };

        Ok(Self {
            state: AppState::new(db, mailer, api_key, config.server.authless),
            port: config.server.port,
            allowed_origins: config.server.allowed_origins.clone(),
        })
    }

    /// Run the HTTP server until the process exits
    pub async fn run(&self) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{}", self.port);
        log::info!("Starting ChurnGuard API on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            ChurnError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            ChurnError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        // Restrict CORS to configured origins; an empty list means local dev,
        // where any origin is fine.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let protected = Router::new()
            .nest("/customer-issues", customer_issues::routes())
            .nest("/predictions", predictions::routes())
            .nest("/email-notifications", email_notifications::routes())
            .nest("/clients", clients::routes())
            .nest("/notes", notes::routes())
            .nest("/users", users::routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/health", get(handle_health))
            .merge(protected)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(self.state.clone())
    }
}

/// Static bearer-token check applied to every route except /health
async fn require_api_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if state.authless {
        return next.run(request).await;
    }

    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == state.api_key)
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        )
            .into_response();
    }

    next.run(request).await
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Error wrapper mapping domain failures onto HTTP responses
pub struct ApiError(pub ChurnError);

impl From<ChurnError> for ApiError {
    fn from(e: ChurnError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ChurnError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ChurnError::Conflict(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ChurnError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m.clone()),
            e => {
                log::error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wire shape for CSV upload outcomes, success or failure
#[derive(Debug, Serialize)]
pub struct CsvUploadResponse {
    pub message: String,
    pub processed_count: usize,
    pub total_rows: usize,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Convert an ingestion report into the HTTP response: 200 on success,
/// 400 with the same structured body on failure.
pub(crate) fn csv_report_response(report: CsvImportReport) -> Response {
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let errors = if report.errors.is_empty() && report.success {
        None
    } else {
        Some(report.errors)
    };
    let body = CsvUploadResponse {
        message: report.message,
        processed_count: report.processed_count,
        total_rows: report.total_rows,
        errors,
        suggestion: report.suggestion,
    };
    (status, Json(body)).into_response()
}

fn upload_rejection(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

/// Pull the uploaded CSV out of the multipart body and apply the boundary
/// checks: the filename must end in .csv and the content must be UTF-8.
/// Each rejection is distinct so callers can tell what to fix.
pub(crate) async fn read_csv_upload(
    multipart: &mut Multipart,
) -> std::result::Result<String, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(upload_rejection("Missing file upload")),
            Err(e) => return Err(upload_rejection(&format!("Invalid multipart body: {}", e))),
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !filename.ends_with(".csv") {
            return Err(upload_rejection("File must be a CSV file"));
        }

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(upload_rejection(&format!("Failed to read upload: {}", e))),
        };

        return String::from_utf8(bytes.to_vec())
            .map_err(|_| upload_rejection("File must be a valid UTF-8 encoded CSV file"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_report_response_errors_null_on_clean_success() {
        let report = CsvImportReport::success("Successfully processed 2 customer issues".to_string(), 2, 2, vec![]);
        let errors = if report.errors.is_empty() && report.success {
            None
        } else {
            Some(report.errors.clone())
        };
        assert!(errors.is_none());

        let failure = CsvImportReport::failure("No valid records found in CSV".to_string(), 0, vec![]);
        assert!(!failure.success);
    }

    #[test]
    fn test_api_error_status_mapping() {
        let not_found = ApiError(ChurnError::NotFound("client x".to_string())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict = ApiError(ChurnError::Conflict("dup".to_string())).into_response();
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);

        let internal = ApiError(ChurnError::Config("boom".to_string())).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
