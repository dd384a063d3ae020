use crate::error::AnalyticsError;
use crate::indicators::{self, RSI_PERIOD, VOLATILITY_WINDOW};
use crate::report::{AnalyticsSummary, ChartSeries, SeriesPoint};
use core_types::PricePoint;

/// RSI reported for histories too short to produce a value.
const NEUTRAL_RSI: f64 = 50.0;

/// A stateless calculator for deriving report statistics and charts from daily closes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the headline statistics of a report.
    ///
    /// # Arguments
    ///
    /// * `prices` - Daily closes in chronological order, without gaps.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AnalyticsSummary` or an `AnalyticsError` when the
    /// series is empty or contains an unusable price.
    pub fn calculate_summary(&self, prices: &[PricePoint]) -> Result<AnalyticsSummary, AnalyticsError> {
        let closes = Self::validated_closes(prices)?;
        let returns = indicators::daily_returns(&closes);

        let summary = AnalyticsSummary {
            cumulative_return: indicators::cumulative_return(&closes),
            max_drawdown: indicators::max_drawdown(&closes),
            latest_volatility: indicators::rolling_volatility(&returns, VOLATILITY_WINDOW)
                .last()
                .copied()
                .unwrap_or(0.0),
            latest_rsi: indicators::rsi(&closes, RSI_PERIOD).last().copied().unwrap_or(NEUTRAL_RSI),
        };

        tracing::debug!(
            points = prices.len(),
            cumulative_return = summary.cumulative_return,
            max_drawdown = summary.max_drawdown,
            latest_volatility = summary.latest_volatility,
            latest_rsi = summary.latest_rsi,
            "Summary statistics calculated."
        );
        Ok(summary)
    }

    /// Builds the four dated chart series of a report.
    ///
    /// Every derived point is dated at the last price it depends on: a return at the
    /// later of its two prices, a volatility or RSI value at the end of its window.
    pub fn generate_series(&self, prices: &[PricePoint]) -> Result<ChartSeries, AnalyticsError> {
        let closes = Self::validated_closes(prices)?;
        let returns = indicators::daily_returns(&closes);
        let volatility = indicators::rolling_volatility(&returns, VOLATILITY_WINDOW);
        let rsi = indicators::rsi(&closes, RSI_PERIOD);

        Ok(ChartSeries {
            prices: prices.iter().map(|p| SeriesPoint::new(p.date, p.close)).collect(),
            returns: Self::dated(prices, 1, returns.iter().map(|r| r * 100.0)),
            volatility: Self::dated(prices, VOLATILITY_WINDOW, volatility.iter().map(|v| v * 100.0)),
            rsi: Self::dated(prices, RSI_PERIOD, rsi.into_iter()),
        })
    }

    /// Pairs `values` with the dates of `prices`, starting at `prices[offset]`.
    fn dated(prices: &[PricePoint], offset: usize, values: impl Iterator<Item = f64>) -> Vec<SeriesPoint> {
        prices
            .iter()
            .skip(offset)
            .zip(values)
            .map(|(price, value)| SeriesPoint::new(price.date, value))
            .collect()
    }

    fn validated_closes(prices: &[PricePoint]) -> Result<Vec<f64>, AnalyticsError> {
        if prices.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "at least one close price is required".to_string(),
            ));
        }
        prices
            .iter()
            .map(|p| {
                if p.close.is_finite() && p.close > 0.0 {
                    Ok(p.close)
                } else {
                    Err(AnalyticsError::InvalidPrice {
                        date: p.date.to_string(),
                        price: p.close,
                    })
                }
            })
            .collect()
    }
}
