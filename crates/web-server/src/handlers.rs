use crate::dto::{
    AnalysisResultResponse, ComponentHealth, HealthComponents, HealthResponse, JobStatusResponse, RunAnalysisRequest,
    RunAnalysisResponse,
};
use crate::{error::AppError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use core_types::{AnalysisRange, Job, JobStatus};
use database::AnalysisResult;
use orchestrator::OrchestratorError;
use std::sync::Arc;
use uuid::Uuid;

/// # POST /api/analysis/run
/// Starts an analysis job and returns immediately with its id.
pub async fn run_analysis(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunAnalysisRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RunAnalysisResponse>), AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::Rejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    let symbol = request.symbol.unwrap_or_default();
    let range = request.range.unwrap_or_else(|| AnalysisRange::default().to_string());
    let job = state.orchestrator.create_job(&symbol, &range).await?;

    Ok((StatusCode::CREATED, Json(RunAnalysisResponse::from(&job))))
}

/// # GET /api/analysis/:job_id/status
/// The status projection of a job. Never loads the result payload.
pub async fn get_job_status(
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// # GET /api/analysis/:job_id
/// 202 while running, 200 with the result once completed, 500 if the job failed.
pub async fn get_analysis_result(
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let job = find_job(&state, &job_id).await?;

    let response = match job.status {
        JobStatus::Running => (StatusCode::ACCEPTED, Json(JobStatusResponse::from(&job))).into_response(),
        JobStatus::Failed => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(JobStatusResponse::from(&job))).into_response()
        }
        JobStatus::Completed => {
            let result = result_of_completed(&state, &job).await?;
            Json(AnalysisResultResponse::from(result)).into_response()
        }
    };
    Ok(response)
}

/// # GET /api/analysis/ticker/:symbol/latest
/// The result of the most recently created completed job for a ticker.
pub async fn get_latest_for_ticker(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisResultResponse>, AppError> {
    let job = state.orchestrator.get_latest_completed_job(&symbol).await?;
    let result = result_of_completed(&state, &job).await?;
    Ok(Json(AnalysisResultResponse::from(result)))
}

/// # GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let stores = state.orchestrator.check_stores().await;
    let (status, label) = if stores.is_up() {
        (StatusCode::OK, "UP")
    } else {
        tracing::warn!(job_store = ?stores.job_store, result_store = ?stores.result_store, "Health check failed.");
        (StatusCode::SERVICE_UNAVAILABLE, "DOWN")
    };

    let body = HealthResponse {
        status: label.to_string(),
        components: HealthComponents {
            job_store: ComponentHealth::from_ping(&stores.job_store),
            result_store: ComponentHealth::from_ping(&stores.result_store),
        },
    };
    (status, Json(body))
}

/// Anything outside the routing table.
pub async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Looks up a job by its raw path segment. Malformed ids are simply unknown ids.
async fn find_job(state: &AppState, raw_id: &str) -> Result<Job, AppError> {
    let job_id = Uuid::parse_str(raw_id).map_err(|_| AppError::NotFound(format!("Job {raw_id} not found")))?;
    Ok(state.orchestrator.get_job(job_id).await?)
}

/// Fetches the result of a job known to be completed. A missing result breaks
/// the store invariant and is reported as an internal error.
async fn result_of_completed(state: &AppState, job: &Job) -> Result<AnalysisResult, AppError> {
    match state.orchestrator.get_result(job.id).await {
        Ok(result) => Ok(result),
        Err(OrchestratorError::NotFound(_)) => Err(AppError::Internal(format!(
            "data inconsistency: job {} is COMPLETED but has no stored result",
            job.id
        ))),
        Err(e) => Err(e.into()),
    }
}
