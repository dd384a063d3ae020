use crate::error::DbError;
use crate::models::AnalysisResult;
use crate::store::{JobStore, ResultStore};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{Job, JobStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local job store. Used by the `analyze` command and by tests.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<JobTable>,
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<Uuid, (u64, Job)>,
    // Insertion counter; breaks ties between jobs created in the same instant.
    next_seq: u64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate(&self, job_id: Uuid, apply: impl FnOnce(&mut Job) -> Result<(), core_types::CoreError>) -> Result<Job, DbError> {
        let mut table = self.inner.write().await;
        let (_, job) = table.jobs.get_mut(&job_id).ok_or(DbError::NotFound)?;
        // Apply to a copy so a rejected write leaves the stored job untouched.
        let mut updated = job.clone();
        apply(&mut updated)?;
        *job = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), DbError> {
        let mut table = self.inner.write().await;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.jobs.insert(job.id, (seq, job.clone()));
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Job, DbError> {
        let table = self.inner.read().await;
        table.jobs.get(&job_id).map(|(_, job)| job.clone()).ok_or(DbError::NotFound)
    }

    async fn update_progress(&self, job_id: Uuid, progress: u8) -> Result<Job, DbError> {
        self.mutate(job_id, |job| job.advance_progress(progress, Utc::now())).await
    }

    async fn complete(&self, job_id: Uuid) -> Result<Job, DbError> {
        self.mutate(job_id, |job| job.mark_completed(Utc::now())).await
    }

    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<Job, DbError> {
        self.mutate(job_id, |job| job.mark_failed(error_message, Utc::now())).await
    }

    async fn latest_completed(&self, symbol: &str) -> Result<Job, DbError> {
        let table = self.inner.read().await;
        table
            .jobs
            .values()
            .filter(|(_, job)| job.symbol == symbol && job.status == JobStatus::Completed)
            .max_by_key(|(seq, job)| (job.created_at, *seq))
            .map(|(_, job)| job.clone())
            .ok_or(DbError::NotFound)
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Process-local result store.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<Uuid, AnalysisResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn insert(&self, result: &AnalysisResult) -> Result<(), DbError> {
        let mut results = self.results.write().await;
        if results.contains_key(&result.job_id) {
            return Err(DbError::AlreadyExists(result.job_id));
        }
        results.insert(result.job_id, result.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<AnalysisResult, DbError> {
        let results = self.results.read().await;
        results.get(&job_id).cloned().ok_or(DbError::NotFound)
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::{AnalyticsSummary, ChartSeries};
    use chrono::Duration;
    use core_types::{AnalysisRange, CoreError, Symbol};

    fn new_job(symbol: &str) -> Job {
        Job::new(Symbol::parse(symbol).unwrap(), AnalysisRange::OneYear)
    }

    fn result_for(job: &Job) -> AnalysisResult {
        AnalysisResult {
            job_id: job.id,
            symbol: job.symbol.clone(),
            range: job.range,
            generated_at: Utc::now(),
            summary: AnalyticsSummary {
                cumulative_return: 0.1,
                max_drawdown: -0.05,
                latest_volatility: 0.2,
                latest_rsi: 55.0,
            },
            series: ChartSeries::default(),
        }
    }

    #[tokio::test]
    async fn inserted_job_can_be_read_back() {
        let store = InMemoryJobStore::new();
        let job = new_job("AAPL");
        store.insert(&job).await.unwrap();

        assert_eq!(store.get(job.id).await.unwrap(), job);
        assert!(matches!(store.get(Uuid::new_v4()).await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn progress_regression_is_rejected_and_leaves_job_untouched() {
        let store = InMemoryJobStore::new();
        let job = new_job("AAPL");
        store.insert(&job).await.unwrap();

        store.update_progress(job.id, 50).await.unwrap();
        let err = store.update_progress(job.id, 20).await.unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::InvalidTransition(_))));
        assert_eq!(store.get(job.id).await.unwrap().progress, 50);
    }

    #[tokio::test]
    async fn terminal_jobs_reject_every_write() {
        let store = InMemoryJobStore::new();
        let job = new_job("MSFT");
        store.insert(&job).await.unwrap();

        let completed = store.complete(job.id).await.unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, 100);
        assert!(completed.completed_at.is_some());

        assert!(store.update_progress(job.id, 100).await.is_err());
        assert!(store.fail(job.id, "late failure").await.is_err());
        assert!(store.complete(job.id).await.is_err());

        let stored = store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn failing_records_the_reason() {
        let store = InMemoryJobStore::new();
        let job = new_job("ZZZZ");
        store.insert(&job).await.unwrap();
        store.update_progress(job.id, 20).await.unwrap();

        let failed = store.fail(job.id, "No price data available for ZZZZ").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 20);
        assert_eq!(failed.error_message.as_deref(), Some("No price data available for ZZZZ"));
    }

    #[tokio::test]
    async fn latest_completed_prefers_the_most_recently_created_job() {
        let store = InMemoryJobStore::new();
        let mut older = new_job("AAPL");
        older.created_at -= Duration::minutes(5);
        let newer = new_job("AAPL");
        let running = new_job("AAPL");
        let other_symbol = new_job("MSFT");

        for job in [&older, &newer, &running, &other_symbol] {
            store.insert(job).await.unwrap();
        }
        // Completion order is the reverse of creation order.
        store.complete(newer.id).await.unwrap();
        store.complete(older.id).await.unwrap();
        store.complete(other_symbol.id).await.unwrap();

        assert_eq!(store.latest_completed("AAPL").await.unwrap().id, newer.id);
        assert!(matches!(store.latest_completed("GOOG").await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn results_are_write_once() {
        let store = InMemoryResultStore::new();
        let job = new_job("AAPL");
        let first = result_for(&job);
        store.insert(&first).await.unwrap();

        let mut second = result_for(&job);
        second.summary.latest_rsi = 10.0;
        assert!(matches!(store.insert(&second).await, Err(DbError::AlreadyExists(id)) if id == job.id));
        assert_eq!(store.get(job.id).await.unwrap(), first);
        assert!(matches!(store.get(Uuid::new_v4()).await, Err(DbError::NotFound)));
    }
}
