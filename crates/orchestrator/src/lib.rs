//! # MarketLens Job Orchestrator
//!
//! This crate owns the lifecycle of an analysis job, from validated creation to
//! its single terminal transition.
//!
//! ## Architectural Principles
//!
//! - **Layer 4 Coordinator:** The orchestrator is the only component that writes
//!   to a job after creation. It composes the market data client, the analytics
//!   engine and both stores, all injected behind traits.
//! - **Non-Blocking Creation:** `create_job` persists the job and hands the
//!   pipeline to the `WorkerPool`; it returns without waiting for the pipeline.
//! - **Failure Containment:** A failing step is recorded on the job as its
//!   `error_message`. Neither the pool nor other jobs are affected.
//!
//! ## Public API
//!
//! - `JobOrchestrator`: job creation, execution and queries.
//! - `WorkerPool`: the bounded pool jobs run on.
//! - `OrchestratorError` / `ExecutionError` / `PoolError`: the specific error types.

pub mod error;
pub mod pool;

pub use error::{ExecutionError, OrchestratorError, PoolError};
pub use pool::WorkerPool;

use analytics::AnalyticsEngine;
use api_client::MarketDataClient;
use chrono::Utc;
use core_types::{AnalysisRange, Job, Symbol};
use database::{AnalysisResult, DbError, JobStore, ResultStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Progress recorded before each pipeline step starts.
const PROGRESS_FETCHING: u8 = 20;
const PROGRESS_SUMMARIZING: u8 = 50;
const PROGRESS_CHARTING: u8 = 70;
const PROGRESS_SAVING: u8 = 90;

/// Liveness of the two stores, as reported by their `ping`.
#[derive(Debug)]
pub struct StoreHealth {
    pub job_store: Result<(), DbError>,
    pub result_store: Result<(), DbError>,
}

impl StoreHealth {
    pub fn is_up(&self) -> bool {
        self.job_store.is_ok() && self.result_store.is_ok()
    }
}

#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    market_data: Arc<dyn MarketDataClient>,
    engine: AnalyticsEngine,
    pool: Arc<WorkerPool>,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        market_data: Arc<dyn MarketDataClient>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            jobs,
            results,
            market_data,
            engine: AnalyticsEngine::new(),
            pool,
        }
    }

    /// Validates the request, persists a `RUNNING` job and schedules its pipeline.
    ///
    /// Invalid input fails with `InvalidArgument` before anything is stored.
    pub async fn create_job(&self, symbol: &str, range: &str) -> Result<Job, OrchestratorError> {
        let symbol = Symbol::parse(symbol)?;
        let range = range.parse::<AnalysisRange>()?;

        let job = Job::new(symbol, range);
        self.jobs.insert(&job).await?;
        tracing::info!(job_id = %job.id, symbol = %job.symbol, range = %job.range, "Analysis job created.");

        // The span is created here so the job's logs nest under the request that started it.
        let span = tracing::info_span!("analysis_job", job_id = %job.id, symbol = %job.symbol, range = %job.range);
        let this = self.clone();
        let job_id = job.id;
        if let Err(e) = self.pool.submit(async move { this.execute(job_id).await }.instrument(span)).await {
            self.jobs.fail(job_id, &e.to_string()).await?;
            return Err(e.into());
        }

        Ok(job)
    }

    /// Runs the pipeline of one job and records its terminal state.
    ///
    /// Never returns an error: a failed step is written to the job instead.
    pub async fn execute(&self, job_id: Uuid) {
        let started = Instant::now();
        match self.run_pipeline(job_id).await {
            Ok(job) => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    completed_at = ?job.completed_at,
                    "Analysis job completed."
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Analysis job failed.");
                if let Err(store_err) = self.jobs.fail(job_id, &message).await {
                    tracing::error!(error = %store_err, "Could not record the failure of the analysis job.");
                }
            }
        }
    }

    async fn run_pipeline(&self, job_id: Uuid) -> Result<Job, ExecutionError> {
        let job = self.jobs.get(job_id).await?;

        self.advance(job_id, PROGRESS_FETCHING).await?;
        let prices = self.market_data.fetch_daily_closes(&job.symbol, job.range).await?;
        tracing::debug!(points = prices.len(), "Fetched price history.");

        self.advance(job_id, PROGRESS_SUMMARIZING).await?;
        let summary = self.engine.calculate_summary(&prices)?;

        self.advance(job_id, PROGRESS_CHARTING).await?;
        let series = self.engine.generate_series(&prices)?;

        self.advance(job_id, PROGRESS_SAVING).await?;
        let result = AnalysisResult {
            job_id,
            symbol: job.symbol.clone(),
            range: job.range,
            generated_at: Utc::now(),
            summary,
            series,
        };
        self.results.insert(&result).await?;

        // The result is already stored, so a failure here leaves an orphaned
        // result behind a FAILED job. Both stores are written by this task only.
        let job = self.jobs.complete(job_id).await.inspect_err(|e| {
            tracing::error!(error = %e, "Result stored but the job could not be marked completed.");
        })?;
        Ok(job)
    }

    async fn advance(&self, job_id: Uuid, progress: u8) -> Result<(), ExecutionError> {
        self.jobs.update_progress(job_id, progress).await?;
        tracing::info!(progress, "Analysis job progress.");
        Ok(())
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, OrchestratorError> {
        self.jobs.get(job_id).await.map_err(|e| not_found_as(e, || format!("Job {job_id}")))
    }

    /// The stored result of a job. Only `COMPLETED` jobs have one.
    pub async fn get_result(&self, job_id: Uuid) -> Result<AnalysisResult, OrchestratorError> {
        self.results
            .get(job_id)
            .await
            .map_err(|e| not_found_as(e, || format!("Result for job {job_id}")))
    }

    /// The most recently created `COMPLETED` job for a symbol.
    ///
    /// The symbol is normalized first, so `aapl` finds jobs created for `AAPL`.
    pub async fn get_latest_completed_job(&self, symbol: &str) -> Result<Job, OrchestratorError> {
        let not_found = || format!("Completed analysis for {}", symbol.trim().to_ascii_uppercase());
        let symbol = Symbol::parse(symbol).map_err(|_| OrchestratorError::NotFound(not_found()))?;
        self.jobs
            .latest_completed(symbol.as_str())
            .await
            .map_err(|e| not_found_as(e, not_found))
    }

    pub async fn check_stores(&self) -> StoreHealth {
        let (job_store, result_store) = tokio::join!(self.jobs.ping(), self.results.ping());
        StoreHealth { job_store, result_store }
    }

    /// Stops accepting jobs and waits for running ones, bounded by the pool's grace period.
    pub async fn shutdown(&self) -> bool {
        self.pool.shutdown(self.pool.settings().shutdown_grace).await
    }
}

fn not_found_as(error: DbError, what: impl FnOnce() -> String) -> OrchestratorError {
    match error {
        DbError::NotFound => OrchestratorError::NotFound(what()),
        other => OrchestratorError::Store(other),
    }
}
