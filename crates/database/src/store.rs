use crate::error::DbError;
use crate::models::AnalysisResult;
use async_trait::async_trait;
use core_types::Job;
use uuid::Uuid;

/// Persistence for job metadata records.
///
/// Every mutation is a single conditional write against a `Running` job.
/// Implementations return `DbError::Core` when the job state machine rejects
/// the write and `DbError::NotFound` when the job does not exist.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<(), DbError>;

    async fn get(&self, job_id: Uuid) -> Result<Job, DbError>;

    /// Raises progress. Regressions and writes to terminal jobs are rejected.
    async fn update_progress(&self, job_id: Uuid, progress: u8) -> Result<Job, DbError>;

    /// `Running -> Completed`, progress 100.
    async fn complete(&self, job_id: Uuid) -> Result<Job, DbError>;

    /// `Running -> Failed` with a human-readable reason.
    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<Job, DbError>;

    /// The most recently created `Completed` job for an already normalized symbol.
    async fn latest_completed(&self, symbol: &str) -> Result<Job, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}

/// Persistence for analysis results. Entries are write-once.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fails with `DbError::AlreadyExists` if the job already has a result.
    async fn insert(&self, result: &AnalysisResult) -> Result<(), DbError>;

    async fn get(&self, job_id: Uuid) -> Result<AnalysisResult, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}
