use api_client::MarketDataClient;
use api_client::error::ApiError;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use configuration::WorkerPoolSettings;
use core_types::{AnalysisRange, Job, JobStatus, PricePoint};
use database::{DbError, InMemoryJobStore, InMemoryResultStore, JobStore};
use orchestrator::{JobOrchestrator, OrchestratorError, WorkerPool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

fn history(days: usize) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    (0..days)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.4 + (i as f64 * 0.7).sin() * 3.0;
            PricePoint::new(start + ChronoDuration::days(i as i64), close)
        })
        .collect()
}

/// Serves canned histories per symbol. Unknown symbols fail like the live provider does.
#[derive(Default)]
struct ScriptedMarketData {
    histories: HashMap<String, Vec<PricePoint>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedMarketData {
    fn with(mut self, symbol: &str, prices: Vec<PricePoint>) -> Self {
        self.histories.insert(symbol.to_string(), prices);
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl MarketDataClient for ScriptedMarketData {
    async fn fetch_daily_closes(&self, symbol: &str, _range: AnalysisRange) -> Result<Vec<PricePoint>, ApiError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.histories
            .get(symbol)
            .cloned()
            .ok_or_else(|| ApiError::DataUnavailable(symbol.to_string()))
    }
}

/// Wraps the in-memory store and records every write the orchestrator makes.
#[derive(Default)]
struct RecordingJobStore {
    inner: InMemoryJobStore,
    inserts: Mutex<usize>,
    progress: Mutex<Vec<u8>>,
}

#[async_trait]
impl JobStore for RecordingJobStore {
    async fn insert(&self, job: &Job) -> Result<(), DbError> {
        *self.inserts.lock().unwrap() += 1;
        self.inner.insert(job).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Job, DbError> {
        self.inner.get(job_id).await
    }

    async fn update_progress(&self, job_id: Uuid, progress: u8) -> Result<Job, DbError> {
        self.progress.lock().unwrap().push(progress);
        self.inner.update_progress(job_id, progress).await
    }

    async fn complete(&self, job_id: Uuid) -> Result<Job, DbError> {
        self.inner.complete(job_id).await
    }

    async fn fail(&self, job_id: Uuid, error_message: &str) -> Result<Job, DbError> {
        self.inner.fail(job_id, error_message).await
    }

    async fn latest_completed(&self, symbol: &str) -> Result<Job, DbError> {
        self.inner.latest_completed(symbol).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.inner.ping().await
    }
}

fn pool() -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(WorkerPoolSettings {
        core_workers: 2,
        max_workers: 4,
        queue_capacity: 10,
        keep_alive: Duration::from_secs(60),
        shutdown_grace: Duration::from_secs(5),
    }))
}

fn orchestrator(jobs: Arc<RecordingJobStore>, market_data: ScriptedMarketData) -> JobOrchestrator {
    JobOrchestrator::new(jobs, Arc::new(InMemoryResultStore::new()), Arc::new(market_data), pool())
}

async fn wait_until_terminal(orchestrator: &JobOrchestrator, job_id: Uuid) -> Job {
    for _ in 0..500 {
        let job = orchestrator.get_job(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn create_returns_while_the_fetch_is_still_pending() {
    let gate = Arc::new(Notify::new());
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(
        Arc::clone(&jobs),
        ScriptedMarketData::default().with("AAPL", history(60)).gated(Arc::clone(&gate)),
    );

    let job = orchestrator.create_job("aapl", "1y").await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 0);
    assert_eq!(job.symbol, "AAPL");
    assert_eq!(job.range, AnalysisRange::OneYear);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let polled = orchestrator.get_job(job.id).await.unwrap();
    assert_eq!(polled.status, JobStatus::Running);
    assert!(polled.progress <= 20);
    assert!(matches!(orchestrator.get_result(job.id).await, Err(OrchestratorError::NotFound(_))));

    gate.notify_one();
    let finished = wait_until_terminal(&orchestrator, job.id).await;
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert!(finished.completed_at.is_some());

    let result = orchestrator.get_result(job.id).await.unwrap();
    assert_eq!(result.job_id, job.id);
    assert_eq!(result.symbol, "AAPL");
    assert_eq!(result.series.prices.len(), 60);
    assert_eq!(result.series.returns.len(), 59);
    assert_eq!(result.series.volatility.len(), 29);
    assert_eq!(result.series.rsi.len(), 45);
}

#[tokio::test]
async fn a_year_of_prices_produces_a_full_summary() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("AAPL", history(252)));

    let job = orchestrator.create_job("AAPL", "1Y").await.unwrap();
    let mut last_progress = 0;
    let finished = loop {
        let polled = orchestrator.get_job(job.id).await.unwrap();
        assert!(polled.progress >= last_progress, "progress went from {last_progress} to {}", polled.progress);
        last_progress = polled.progress;
        if polled.status.is_terminal() {
            break polled;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.progress, 100);

    let result = orchestrator.get_result(job.id).await.unwrap();
    assert_eq!(result.series.prices.len(), 252);
    assert_eq!(result.series.returns.len(), 251);
    assert_eq!(result.series.volatility.len(), 221);
    assert_eq!(result.series.rsi.len(), 237);

    let summary = &result.summary;
    for (name, value) in [
        ("cumulative_return", summary.cumulative_return),
        ("max_drawdown", summary.max_drawdown),
        ("latest_volatility", summary.latest_volatility),
        ("latest_rsi", summary.latest_rsi),
    ] {
        assert!(value.is_finite(), "{name} = {value}");
    }
    assert!(summary.cumulative_return > 0.0);
    assert!((-1.0..=0.0).contains(&summary.max_drawdown));
    assert!(summary.latest_volatility > 0.0);
    assert!((0.0..=100.0).contains(&summary.latest_rsi));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_anything_is_stored() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default());

    let cases = [("", "1Y", "symbol"), ("TOOLONGSYMBOL", "1Y", "symbol"), ("9ABC", "1Y", "symbol"), ("AAPL", "2Y", "range")];
    for (symbol, range, expected_field) in cases {
        match orchestrator.create_job(symbol, range).await {
            Err(OrchestratorError::InvalidArgument { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected InvalidArgument for {symbol:?}/{range:?}, got {other:?}"),
        }
    }
    assert_eq!(*jobs.inserts.lock().unwrap(), 0);
}

#[tokio::test]
async fn progress_steps_are_written_in_order() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("MSFT", history(40)));

    let job = orchestrator.create_job("MSFT", "3M").await.unwrap();
    let finished = wait_until_terminal(&orchestrator, job.id).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(*jobs.progress.lock().unwrap(), vec![20, 50, 70, 90]);
    assert!(finished.error_message.is_none());
}

#[tokio::test]
async fn failed_fetch_marks_the_job_failed_without_a_result() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default());

    let job = orchestrator.create_job("ZZZZ", "1Y").await.unwrap();
    let finished = wait_until_terminal(&orchestrator, job.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.progress, 20);
    assert!(finished.completed_at.is_some());
    let message = finished.error_message.unwrap();
    assert!(message.contains("No price data available for ZZZZ"), "{message}");

    assert!(matches!(orchestrator.get_result(job.id).await, Err(OrchestratorError::NotFound(_))));
    assert!(matches!(
        orchestrator.get_latest_completed_job("ZZZZ").await,
        Err(OrchestratorError::NotFound(_))
    ));
}

#[tokio::test]
async fn corrupt_prices_fail_in_the_analytics_step() {
    let mut prices = history(20);
    prices[7].close = -1.0;
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("BAD", prices));

    let job = orchestrator.create_job("BAD", "1M").await.unwrap();
    let finished = wait_until_terminal(&orchestrator, job.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.progress, 50);
    assert!(finished.error_message.unwrap().starts_with("Failed to compute analytics"));
}

#[tokio::test]
async fn latest_completed_is_the_most_recently_created_job() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("AAPL", history(35)));

    let first = orchestrator.create_job("AAPL", "1M").await.unwrap();
    let second = orchestrator.create_job("aapl", "5Y").await.unwrap();
    wait_until_terminal(&orchestrator, first.id).await;
    wait_until_terminal(&orchestrator, second.id).await;

    let latest = orchestrator.get_latest_completed_job("  aapl ").await.unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.range, AnalysisRange::FiveYears);

    // Neither job saw the other's writes.
    assert_eq!(orchestrator.get_result(first.id).await.unwrap().range, AnalysisRange::OneMonth);
    assert!(matches!(
        orchestrator.get_latest_completed_job("MSFT").await,
        Err(OrchestratorError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_creates_for_one_symbol_stay_independent() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("MSFT", history(60)));

    let (first, second) = tokio::join!(orchestrator.create_job("MSFT", "1Y"), orchestrator.create_job("msft", "6M"));
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_ne!(first.id, second.id);
    assert_eq!(*jobs.inserts.lock().unwrap(), 2);

    let first = wait_until_terminal(&orchestrator, first.id).await;
    let second = wait_until_terminal(&orchestrator, second.id).await;
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);

    let latest = orchestrator.get_latest_completed_job("MSFT").await.unwrap();
    let newest_created = first.created_at.max(second.created_at);
    assert_eq!(latest.created_at, newest_created);
    assert!(latest.id == first.id || latest.id == second.id);

    assert_eq!(orchestrator.get_result(first.id).await.unwrap().range, AnalysisRange::OneYear);
    assert_eq!(orchestrator.get_result(second.id).await.unwrap().range, AnalysisRange::SixMonths);
}

#[tokio::test]
async fn shutdown_waits_for_running_jobs() {
    let jobs = Arc::new(RecordingJobStore::default());
    let orchestrator = orchestrator(Arc::clone(&jobs), ScriptedMarketData::default().with("AAPL", history(35)));

    let job = orchestrator.create_job("AAPL", "1Y").await.unwrap();
    assert!(orchestrator.shutdown().await);
    assert_eq!(orchestrator.get_job(job.id).await.unwrap().status, JobStatus::Completed);

    assert!(matches!(
        orchestrator.create_job("AAPL", "1Y").await,
        Err(OrchestratorError::Pool(_))
    ));
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let orchestrator = orchestrator(Arc::new(RecordingJobStore::default()), ScriptedMarketData::default());
    assert!(matches!(
        orchestrator.get_job(Uuid::new_v4()).await,
        Err(OrchestratorError::NotFound(_))
    ));
    assert!(orchestrator.check_stores().await.is_up());
}
