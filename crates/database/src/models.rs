use analytics::{AnalyticsSummary, ChartSeries};
use chrono::{DateTime, Utc};
use core_types::AnalysisRange;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The computed output of a completed job, as kept in the result store.
///
/// Created exactly once, after every computation step has succeeded, and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub job_id: Uuid,
    pub symbol: String,
    pub range: AnalysisRange,
    pub generated_at: DateTime<Utc>,
    pub summary: AnalyticsSummary,
    pub series: ChartSeries,
}
