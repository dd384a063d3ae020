use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The lifecycle state of an analysis job.
///
/// The only legal transitions are `Running -> Completed` and `Running -> Failed`.
/// Both terminal states accept no further writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(CoreError::InvalidInput(
                "status".to_string(),
                format!("unknown job status '{other}'"),
            )),
        }
    }
}

/// The historical lookback window requested for an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisRange {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[default]
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl AnalysisRange {
    pub const ALL: [AnalysisRange; 5] = [
        AnalysisRange::OneMonth,
        AnalysisRange::ThreeMonths,
        AnalysisRange::SixMonths,
        AnalysisRange::OneYear,
        AnalysisRange::FiveYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisRange::OneMonth => "1M",
            AnalysisRange::ThreeMonths => "3M",
            AnalysisRange::SixMonths => "6M",
            AnalysisRange::OneYear => "1Y",
            AnalysisRange::FiveYears => "5Y",
        }
    }
}

impl fmt::Display for AnalysisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisRange {
    type Err = CoreError;

    /// Parses a range code case-insensitively, e.g. `"1y"` or `"5Y"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        AnalysisRange::ALL
            .into_iter()
            .find(|range| range.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::InvalidInput(
                    "range".to_string(),
                    "Range must be one of: 1M, 3M, 6M, 1Y, 5Y".to_string(),
                )
            })
    }
}
