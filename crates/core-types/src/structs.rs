use crate::enums::{AnalysisRange, JobStatus};
use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length of a ticker symbol, e.g. `BRK.B` or `RDS-A`.
pub const MAX_SYMBOL_LEN: usize = 10;

/// A validated, uppercase ticker symbol.
///
/// Accepted form: 1 to 10 characters, starting with a letter, followed by
/// letters, digits, dots or dashes. Input is trimmed and uppercased first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let invalid = |issue: &str| CoreError::InvalidInput("symbol".to_string(), issue.to_string());

        if normalized.is_empty() {
            return Err(invalid("Symbol is required"));
        }
        if normalized.chars().count() > MAX_SYMBOL_LEN {
            return Err(invalid("Symbol must be between 1 and 10 characters"));
        }

        let mut chars = normalized.chars();
        let first_is_letter = chars.next().is_some_and(|c| c.is_ascii_uppercase());
        let rest_is_valid = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
        if !first_is_letter || !rest_is_valid {
            return Err(invalid(
                "Symbol must start with a letter and contain only letters, digits, dots or dashes (e.g. AAPL, BRK.B)",
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single daily close, as delivered by the market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// The metadata record of a single analysis job.
///
/// This is the small, frequently polled half of the job's persisted state. The
/// computed output lives separately in the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub symbol: String,
    pub range: AnalysisRange,
    pub status: JobStatus,
    /// Percentage 0..=100. Never decreases.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, on the terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only when `status` is `Failed`.
    pub error_message: Option<String>,
}

impl Job {
    /// Creates a fresh `Running` job at 0% progress.
    pub fn new(symbol: Symbol, range: AnalysisRange) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into_inner(),
            range,
            status: JobStatus::Running,
            progress: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advances progress. Rejects terminal jobs, regressions and values above 100.
    pub fn advance_progress(&mut self, progress: u8, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running()?;
        if progress > 100 {
            return Err(CoreError::InvalidTransition(format!(
                "progress {progress} is out of range for job {}",
                self.id
            )));
        }
        if progress < self.progress {
            return Err(CoreError::InvalidTransition(format!(
                "progress of job {} cannot move backwards from {} to {progress}",
                self.id, self.progress
            )));
        }
        self.progress = progress;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Moves the job to `Failed`. Progress is left where the pipeline stopped.
    pub fn mark_failed(&mut self, error_message: impl Into<String>, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::InvalidTransition(format!(
                "job {} is already {} and accepts no further writes",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(Symbol::parse("aapl").unwrap(), AnalysisRange::OneYear)
    }

    #[test]
    fn symbol_is_trimmed_and_uppercased() {
        assert_eq!(Symbol::parse("  brk.b ").unwrap().as_str(), "BRK.B");
        assert_eq!(Symbol::parse("RDS-A").unwrap().as_str(), "RDS-A");
    }

    #[test]
    fn symbol_rejects_empty_long_and_malformed_input() {
        for raw in ["", "   ", "ABCDEFGHIJK", "1ABC", ".A", "AA PL", "AAPL$", "ÄPL"] {
            let err = Symbol::parse(raw).unwrap_err();
            assert!(
                matches!(&err, CoreError::InvalidInput(field, _) if field == "symbol"),
                "expected rejection for {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn new_job_starts_running_at_zero() {
        let job = job();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 0);
        assert_eq!(job.symbol, "AAPL");
        assert!(job.completed_at.is_none());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn progress_cannot_regress() {
        let mut job = job();
        job.advance_progress(50, Utc::now()).unwrap();
        assert!(job.advance_progress(20, Utc::now()).is_err());
        assert_eq!(job.progress, 50);
        job.advance_progress(50, Utc::now()).unwrap();
    }

    #[test]
    fn completion_sets_progress_and_timestamp() {
        let mut job = job();
        let now = Utc::now();
        job.mark_completed(now).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn terminal_jobs_reject_every_write() {
        let mut failed = job();
        failed.mark_failed("upstream unavailable", Utc::now()).unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("upstream unavailable"));
        assert!(failed.advance_progress(90, Utc::now()).is_err());
        assert!(failed.mark_completed(Utc::now()).is_err());
        assert!(failed.mark_failed("again", Utc::now()).is_err());

        let mut completed = job();
        completed.mark_completed(Utc::now()).unwrap();
        assert!(completed.mark_failed("late failure", Utc::now()).is_err());
        assert_eq!(completed.status, JobStatus::Completed);
    }
}
