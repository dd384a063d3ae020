//! The individual formulas behind an analysis report.
//!
//! All functions take plain `f64` slices in chronological order and never fail.
//! An input too short for an indicator yields an empty vector.

/// Number of trailing daily returns in each volatility window.
pub const VOLATILITY_WINDOW: usize = 30;

/// Number of trailing price changes in each RSI window.
pub const RSI_PERIOD: usize = 14;

/// Trading days per year, used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Daily simple returns: `price[i] / price[i - 1] - 1` for `i >= 1`.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// `price[last] / price[0] - 1`, or 0.0 for fewer than two prices.
pub fn cumulative_return(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(first), Some(last)) if prices.len() > 1 => last / first - 1.0,
        _ => 0.0,
    }
}

/// The most negative `price / running_peak - 1` observed. 0.0 for a non-decreasing series.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let Some(&first) = prices.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_drawdown = 0.0_f64;
    for &price in prices {
        if price > peak {
            peak = price;
        }
        let drawdown = price / peak - 1.0;
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
        }
    }
    max_drawdown
}

/// Annualized rolling volatility over `window` returns.
///
/// Value `k` is the sample standard deviation of `returns[k..k + window]` times
/// `sqrt(252)`. The result has `returns.len() - window` values, so the final
/// window ending at the last return is not included.
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || returns.len() <= window {
        return Vec::new();
    }

    let annualization = TRADING_DAYS_PER_YEAR.sqrt();
    (0..returns.len() - window)
        .map(|start| sample_std_dev(&returns[start..start + window]) * annualization)
        .collect()
}

/// Simple-average RSI over `period` price changes.
///
/// Value `k` averages the gains and losses of changes `k..k + period`. When the
/// average loss is zero the RSI is 100. The result has `changes - period` values.
pub fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < 2 {
        return Vec::new();
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = prices
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            if change > 0.0 {
                (change, 0.0)
            } else if change < 0.0 {
                (0.0, -change)
            } else {
                (0.0, 0.0)
            }
        })
        .unzip();

    if gains.len() <= period {
        return Vec::new();
    }

    (0..gains.len() - period)
        .map(|start| {
            let avg_gain = mean(&gains[start..start + period]);
            let avg_loss = mean(&losses[start..start + period]);
            if avg_loss == 0.0 {
                100.0
            } else {
                let rs = avg_gain / avg_loss;
                100.0 - 100.0 / (1.0 + rs)
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std_dev(values: &[f64]) -> f64 {
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn cumulative_return_of_a_quarter() {
        assert_eq!(cumulative_return(&[100.0, 125.0]), 0.25);
        assert_eq!(cumulative_return(&[100.0]), 0.0);
        assert_eq!(cumulative_return(&[]), 0.0);
    }

    #[test]
    fn daily_returns_have_one_less_element() {
        let returns = daily_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < EPS);
        assert!((returns[1] + 0.10).abs() < EPS);
    }

    #[test]
    fn drawdown_tracks_the_running_peak() {
        let drawdown = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((drawdown + 0.25).abs() < EPS);
    }

    #[test]
    fn drawdown_of_a_rising_series_is_zero() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn volatility_length_is_returns_minus_window() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i % 7) as f64).collect();
        let returns = daily_returns(&prices);
        assert_eq!(rolling_volatility(&returns, VOLATILITY_WINDOW).len(), returns.len() - VOLATILITY_WINDOW);
    }

    #[test]
    fn volatility_is_empty_below_thirty_one_prices() {
        let prices: Vec<f64> = (0..31).map(|i| 100.0 + i as f64).collect();
        assert!(rolling_volatility(&daily_returns(&prices), VOLATILITY_WINDOW).is_empty());
        assert!(rolling_volatility(&daily_returns(&prices[..10]), VOLATILITY_WINDOW).is_empty());
    }

    #[test]
    fn volatility_uses_sample_standard_deviation() {
        // Alternating +1% / -1% returns: mean 0, sample variance 0.0001 * n / (n - 1).
        let returns: Vec<f64> = (0..31).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let vol = rolling_volatility(&returns, VOLATILITY_WINDOW);
        assert_eq!(vol.len(), 1);

        let window = &returns[..VOLATILITY_WINDOW];
        let mean = window.iter().sum::<f64>() / 30.0;
        let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 29.0;
        assert!((vol[0] - var.sqrt() * 252f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn constant_returns_have_zero_volatility() {
        let returns = vec![0.001; 45];
        assert!(rolling_volatility(&returns, VOLATILITY_WINDOW).iter().all(|v| v.abs() < EPS));
    }

    #[test]
    fn rsi_is_100_when_every_change_is_a_gain() {
        let prices: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let values = rsi(&prices, RSI_PERIOD);
        assert_eq!(values.len(), prices.len() - 1 - RSI_PERIOD);
        assert!(values.iter().all(|v| *v == 100.0));
    }

    #[test]
    fn rsi_is_0_when_every_change_is_a_loss() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let values = rsi(&prices, RSI_PERIOD);
        assert!(!values.is_empty());
        assert!(values.iter().all(|v| v.abs() < EPS));
    }

    #[test]
    fn flat_prices_give_rsi_100() {
        assert!(rsi(&[50.0; 20], RSI_PERIOD).iter().all(|v| *v == 100.0));
    }

    #[test]
    fn rsi_needs_more_than_period_changes() {
        let prices: Vec<f64> = (0..15).map(|i| 10.0 + i as f64).collect();
        assert!(rsi(&prices, RSI_PERIOD).is_empty());
        assert!(rsi(&[], RSI_PERIOD).is_empty());
    }

    #[test]
    fn rsi_balances_equal_gains_and_losses_at_50() {
        let prices: Vec<f64> = (0..16).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let values = rsi(&prices, RSI_PERIOD);
        assert_eq!(values.len(), 1);
        assert!((values[0] - 50.0).abs() < EPS);
    }

    fn price_series() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(1.0f64..1_000.0, 2..120)
    }

    proptest! {
        #[test]
        fn rsi_stays_within_bounds(prices in price_series()) {
            for value in rsi(&prices, RSI_PERIOD) {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }

        #[test]
        fn drawdown_is_never_positive(prices in price_series()) {
            let drawdown = max_drawdown(&prices);
            prop_assert!(drawdown <= 0.0);
            prop_assert!(drawdown > -1.0);
        }

        #[test]
        fn volatility_is_non_negative(prices in price_series()) {
            let returns = daily_returns(&prices);
            let expected = returns.len().saturating_sub(VOLATILITY_WINDOW);
            let vol = rolling_volatility(&returns, VOLATILITY_WINDOW);
            prop_assert_eq!(vol.len(), expected);
            prop_assert!(vol.iter().all(|v| *v >= 0.0));
        }
    }
}
