use crate::error::ApiError;
use crate::responses::{ChartResponse, ChartResult};
use async_trait::async_trait;
use chrono::DateTime;
use configuration::MarketDataSettings;
use core_types::{AnalysisRange, PricePoint};

pub mod error;
pub mod responses;

/// The abstract interface of a daily price provider.
/// This trait is the contract the job orchestrator uses, allowing the
/// underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Fetches daily closes for `symbol` over `range`, oldest first.
    ///
    /// An empty history is an error, never an empty `Ok`.
    async fn fetch_daily_closes(&self, symbol: &str, range: AnalysisRange) -> Result<Vec<PricePoint>, ApiError>;
}

/// A concrete implementation of the `MarketDataClient` for the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new(settings: &MarketDataSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The provider's spelling of a lookback range.
    fn provider_range(range: AnalysisRange) -> &'static str {
        match range {
            AnalysisRange::OneMonth => "1mo",
            AnalysisRange::ThreeMonths => "3mo",
            AnalysisRange::SixMonths => "6mo",
            AnalysisRange::OneYear => "1y",
            AnalysisRange::FiveYears => "5y",
        }
    }
}

#[async_trait]
impl MarketDataClient for YahooFinanceClient {
    async fn fetch_daily_closes(&self, symbol: &str, range: AnalysisRange) -> Result<Vec<PricePoint>, ApiError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        tracing::info!(%symbol, %range, %url, "Fetching daily closes.");

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", Self::provider_range(range))])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        // The provider reports unknown symbols with a non-2xx status and a chart error body.
        let parsed = serde_json::from_str::<ChartResponse>(&text);
        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|body| body.chart.error)
                .map(|e| e.description.unwrap_or(e.code))
                .unwrap_or_else(|| format!("HTTP {status}"));
            tracing::warn!(%symbol, %status, %detail, "Market data request failed.");
            return Err(ApiError::ApiError(format!("{symbol}: {detail}")));
        }

        let body = parsed.map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let prices = parse_chart(symbol, body)?;
        tracing::info!(%symbol, points = prices.len(), "Parsed daily closes.");
        Ok(prices)
    }
}

/// Extracts the dated, non-null closes of the first chart result.
fn parse_chart(symbol: &str, body: ChartResponse) -> Result<Vec<PricePoint>, ApiError> {
    if let Some(error) = body.chart.error {
        return Err(ApiError::ApiError(format!(
            "{symbol}: {}",
            error.description.unwrap_or(error.code)
        )));
    }

    let ChartResult { timestamp, indicators } = body
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ApiError::DataUnavailable(symbol.to_string()))?;

    let closes = indicators
        .quote
        .into_iter()
        .next()
        .map(|quote| quote.close)
        .unwrap_or_default();

    let prices = timestamp
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| close.map(|close| (ts, close)))
        .map(|(ts, close)| {
            DateTime::from_timestamp(ts, 0)
                .map(|dt| PricePoint::new(dt.date_naive(), close))
                .ok_or_else(|| ApiError::InvalidData(format!("Invalid timestamp: {ts}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if prices.is_empty() {
        return Err(ApiError::DataUnavailable(symbol.to_string()));
    }
    Ok(prices)
}
