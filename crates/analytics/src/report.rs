use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The headline statistics of an analysis.
///
/// Field names follow the wire format of the analysis API, which is also the
/// shape of the document kept in the result store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// `last / first - 1`.
    pub cumulative_return: f64,
    /// Most negative decline from a running peak. Always `<= 0`.
    pub max_drawdown: f64,
    /// Last annualized 30-day volatility, or 0.0 for histories too short to have one.
    pub latest_volatility: f64,
    /// Last 14-period RSI, or 50.0 (neutral) for histories too short to have one.
    #[serde(rename = "latestRSI")]
    pub latest_rsi: f64,
}

/// A single dated value on one of the report charts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// The four time-aligned chart series of a report.
///
/// Returns and volatility are expressed in percent. RSI is on its natural 0..100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub prices: Vec<SeriesPoint>,
    pub returns: Vec<SeriesPoint>,
    pub volatility: Vec<SeriesPoint>,
    pub rsi: Vec<SeriesPoint>,
}
