use crate::error::DbError;
use crate::models::AnalysisResult;
use crate::store::{JobStore, ResultStore};
use analytics::{AnalyticsSummary, ChartSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{AnalysisRange, CoreError, Job, JobStatus};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

const JOB_COLUMNS: &str =
    "job_id, symbol, range_code, status, progress, created_at, updated_at, completed_at, error_message";

/// The `DbRepository` provides the PostgreSQL implementation of both stores.
/// It encapsulates all SQL queries and data access logic.
///
/// Queries are checked at runtime rather than with the `query!` macros, so the
/// workspace builds without a live database.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Represents a row from the `analysis_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct DbJobRow {
    pub job_id: Uuid,
    pub symbol: String,
    pub range_code: String,
    pub status: String,
    pub progress: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl TryFrom<DbJobRow> for Job {
    type Error = DbError;

    fn try_from(row: DbJobRow) -> Result<Self, Self::Error> {
        let progress = u8::try_from(row.progress).map_err(|_| {
            CoreError::InvalidTransition(format!("stored progress {} of job {} is out of range", row.progress, row.job_id))
        })?;
        Ok(Job {
            id: row.job_id,
            symbol: row.symbol,
            range: row.range_code.parse::<AnalysisRange>()?,
            status: row.status.parse::<JobStatus>()?,
            progress,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        })
    }
}

/// Represents a row from the `analysis_results` table.
#[derive(Debug, Clone, FromRow)]
pub struct DbResultRow {
    pub job_id: Uuid,
    pub symbol: String,
    pub range_code: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Json<AnalyticsSummary>,
    pub series: Json<ChartSeries>,
}

impl TryFrom<DbResultRow> for AnalysisResult {
    type Error = DbError;

    fn try_from(row: DbResultRow) -> Result<Self, Self::Error> {
        Ok(AnalysisResult {
            job_id: row.job_id,
            symbol: row.symbol,
            range: row.range_code.parse::<AnalysisRange>()?,
            generated_at: row.generated_at,
            summary: row.summary.0,
            series: row.series.0,
        })
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_job(&self, job_id: Uuid) -> Result<Option<Job>, DbError> {
        let row = sqlx::query_as::<_, DbJobRow>(&format!("SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE job_id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    /// Turns a conditional update that matched no row into the error that
    /// describes why: the job is missing, or the state machine refuses the write.
    async fn rejected_write(
        &self,
        job_id: Uuid,
        attempt: impl FnOnce(&mut Job) -> Result<(), CoreError>,
    ) -> DbError {
        match self.fetch_job(job_id).await {
            Err(e) => e,
            Ok(None) => DbError::NotFound,
            Ok(Some(mut job)) => match attempt(&mut job) {
                Err(e) => e.into(),
                // The row changed between the update and the re-read.
                Ok(()) => CoreError::InvalidTransition(format!("job {job_id} was modified concurrently")).into(),
            },
        }
    }
}

#[async_trait]
impl JobStore for DbRepository {
    async fn insert(&self, job: &Job) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO analysis_jobs ({JOB_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(job.id)
        .bind(&job.symbol)
        .bind(job.range.as_str())
        .bind(job.status.as_str())
        .bind(i16::from(job.progress))
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .bind(&job.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Job, DbError> {
        self.fetch_job(job_id).await?.ok_or(DbError::NotFound)
    }

    async fn update_progress(&self, job_id: Uuid, progress: u8) -> Result<Job, DbError> {
        if progress > 100 {
            return Err(self.rejected_write(job_id, |job| job.advance_progress(progress, Utc::now())).await);
        }
        let row = sqlx::query_as::<_, DbJobRow>(&format!(
            "UPDATE analysis_jobs SET progress = $2, updated_at = $3 \
             WHERE job_id = $1 AND status = 'RUNNING' AND progress <= $2 \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(i16::from(progress))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.rejected_write(job_id, |job| job.advance_progress(progress, Utc::now())).await),
        }
    }

    async fn complete(&self, job_id: Uuid) -> Result<Job, DbError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DbJobRow>(&format!(
            "UPDATE analysis_jobs SET status = 'COMPLETED', progress = 100, updated_at = $2, completed_at = $2 \
             WHERE job_id = $1 AND status = 'RUNNING' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.rejected_write(job_id, |job| job.mark_completed(now)).await),
        }
    }

    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<Job, DbError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DbJobRow>(&format!(
            "UPDATE analysis_jobs SET status = 'FAILED', error_message = $2, updated_at = $3, completed_at = $3 \
             WHERE job_id = $1 AND status = 'RUNNING' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(error_message)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.rejected_write(job_id, |job| job.mark_failed(error_message, now)).await),
        }
    }

    async fn latest_completed(&self, symbol: &str) -> Result<Job, DbError> {
        let row = sqlx::query_as::<_, DbJobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM analysis_jobs \
             WHERE symbol = $1 AND status = 'COMPLETED' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Job::try_from).transpose()?.ok_or(DbError::NotFound)
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for DbRepository {
    async fn insert(&self, result: &AnalysisResult) -> Result<(), DbError> {
        let outcome = sqlx::query(
            "INSERT INTO analysis_results (job_id, symbol, range_code, generated_at, summary, series) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(result.job_id)
        .bind(&result.symbol)
        .bind(result.range.as_str())
        .bind(result.generated_at)
        .bind(Json(&result.summary))
        .bind(Json(&result.series))
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(DbError::AlreadyExists(result.job_id));
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<AnalysisResult, DbError> {
        let row = sqlx::query_as::<_, DbResultRow>(
            "SELECT job_id, symbol, range_code, generated_at, summary, series \
             FROM analysis_results WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AnalysisResult::try_from).transpose()?.ok_or(DbError::NotFound)
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
