use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use orchestrator::OrchestratorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
    /// A request body the extractor refused. Oversized and wrongly typed bodies keep
    /// their 413 / 415; anything unparseable is a plain 400.
    #[error("Rejected body ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Missing or invalid API token")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    /// Logged in full; the client only sees a generic message.
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub issue: String,
}

/// The body of every error response produced by the API itself.
///
/// `path` is filled in by the `fill_error_path` middleware, which is the only
/// place that still has the request URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub details: Vec<FieldIssue>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub path: String,
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String, Vec<FieldIssue>) {
        match self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Request validation failed".to_string(),
                vec![FieldIssue { field, issue: message }],
            ),
            AppError::Rejected { status, message } => {
                let (status, code) = match status {
                    StatusCode::PAYLOAD_TOO_LARGE => (status, "PAYLOAD_TOO_LARGE"),
                    StatusCode::UNSUPPORTED_MEDIA_TYPE => (status, "UNSUPPORTED_MEDIA_TYPE"),
                    _ => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                };
                (status, code, message, Vec::new())
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid API token".to_string(),
                Vec::new(),
            ),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message, Vec::new()),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error.");
                internal()
            }
            AppError::Orchestrator(err) => match err {
                OrchestratorError::InvalidArgument { field, message } => {
                    AppError::Validation { field, message }.parts()
                }
                OrchestratorError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"), Vec::new())
                }
                other => {
                    tracing::error!(error = ?other, "Orchestrator error.");
                    internal()
                }
            },
        }
    }
}

fn internal() -> (StatusCode, &'static str, String, Vec<FieldIssue>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal server error occurred".to_string(),
        Vec::new(),
    )
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = self.parts();
        let body = ApiErrorBody {
            error: error.to_string(),
            message,
            details,
            timestamp: Utc::now(),
            path: String::new(),
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}
