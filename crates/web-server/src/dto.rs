use analytics::{AnalyticsSummary, ChartSeries};
use chrono::{DateTime, Utc};
use core_types::{AnalysisRange, Job, JobStatus};
use database::AnalysisResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/analysis/run`.
///
/// Both fields are optional at the wire level so that a missing symbol is
/// reported as a field-level validation error rather than a parse failure.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunAnalysisRequest {
    pub symbol: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAnalysisResponse {
    pub job_id: Uuid,
    pub symbol: String,
    pub range: AnalysisRange,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
}

impl From<&Job> for RunAnalysisResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            symbol: job.symbol.clone(),
            range: job.range,
            status: job.status,
            progress: job.progress,
            message: format!(
                "Analysis job started. Use /api/analysis/{}/status to poll.",
                job.id
            ),
        }
    }
}

/// The status projection of a job. Never includes the result payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub symbol: String,
    pub range: AnalysisRange,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        let message = match job.status {
            JobStatus::Running => format!("Analysis in progress ({}% complete)", job.progress),
            JobStatus::Completed => "Analysis completed successfully".to_string(),
            JobStatus::Failed => format!(
                "Analysis failed: {}",
                job.error_message.as_deref().unwrap_or("unknown error")
            ),
        };
        Self {
            job_id: job.id,
            symbol: job.symbol.clone(),
            range: job.range,
            status: job.status,
            progress: job.progress,
            message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
        }
    }
}

/// The result payload of a completed job.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResultResponse {
    pub job_id: Uuid,
    pub symbol: String,
    pub range: AnalysisRange,
    pub status: JobStatus,
    pub generated_at: DateTime<Utc>,
    pub summary: AnalyticsSummary,
    pub series: ChartSeries,
}

impl From<AnalysisResult> for AnalysisResultResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            job_id: result.job_id,
            symbol: result.symbol,
            range: result.range,
            status: JobStatus::Completed,
            generated_at: result.generated_at,
            summary: result.summary,
            series: result.series,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn from_ping<E: std::fmt::Display>(ping: &Result<(), E>) -> Self {
        match ping {
            Ok(()) => Self {
                status: "UP".to_string(),
                error: None,
            },
            Err(e) => Self {
                status: "DOWN".to_string(),
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    pub job_store: ComponentHealth,
    pub result_store: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HealthComponents,
}
