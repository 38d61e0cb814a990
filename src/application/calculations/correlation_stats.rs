//! Recency-weighted correlation (spec §3, §4.2).
//!
//! Produce returns from two aligned close series, apply exponentially
//! decaying weights toward the most recent bar, and compute weighted
//! covariance / (weighted std * weighted std). Reject (return 0) if
//! aligned length < 10 or variance is 0.

use crate::domain::errors::CalculationError;
use tracing::debug;

/// Decay rate applied across timeframe weights (spec §3: H1/H4/D1 weighted
/// 0.5/0.3/0.2).
pub const TIMEFRAME_WEIGHTS: [(&str, f64); 3] = [("H1", 0.5), ("H4", 0.3), ("D1", 0.2)];

/// `wi ∝ exp(-λ (n - i))` normalised, λ controls how much more recent bars
/// matter.
fn decay_weights(n: usize, lambda: f64) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|i| (-lambda * ((n - 1 - i) as f64)).exp()).collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        vec![1.0 / n as f64; n]
    } else {
        raw.iter().map(|w| w / sum).collect()
    }
}

fn returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// Weighted Pearson correlation over two aligned close series. Returns 0
/// if aligned length < 10 or variance is 0, per spec §4.2.
pub fn weighted_correlation(series_a: &[f64], series_b: &[f64], lambda: f64) -> f64 {
    let n = series_a.len().min(series_b.len());
    if n < 11 {
        // need >= 10 *returns*, i.e. >= 11 aligned closes
        debug!("correlation_stats: {}", CalculationError::InsufficientHistory { len: n });
        return 0.0;
    }
    let a = &series_a[series_a.len() - n..];
    let b = &series_b[series_b.len() - n..];

    let ra = returns(a);
    let rb = returns(b);
    if ra.len() < 10 {
        debug!("correlation_stats: {}", CalculationError::InsufficientHistory { len: ra.len() });
        return 0.0;
    }

    let weights = decay_weights(ra.len(), lambda);

    let mean_a: f64 = ra.iter().zip(&weights).map(|(r, w)| r * w).sum();
    let mean_b: f64 = rb.iter().zip(&weights).map(|(r, w)| r * w).sum();

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..ra.len() {
        let da = ra[i] - mean_a;
        let db = rb[i] - mean_b;
        cov += weights[i] * da * db;
        var_a += weights[i] * da * da;
        var_b += weights[i] * db * db;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        debug!("correlation_stats: {}", CalculationError::ZeroVariance);
        return 0.0;
    }

    let corr = cov / (var_a.sqrt() * var_b.sqrt());
    corr.clamp(-1.0, 1.0)
}

/// Combine per-timeframe correlations using the H1/H4/D1 weights from
/// spec §3.
pub fn combine_timeframe_correlations(h1: f64, h4: f64, d1: f64) -> f64 {
    h1 * 0.5 + h4 * 0.3 + d1 * 0.2
}

/// Built-in table of default approximate correlations keyed by canonical
/// pair, used as the last-resort fallback in spec §4.5.
pub fn default_correlation_table(a: &str, b: &str) -> f64 {
    let known: &[(&str, &str, f64)] = &[
        ("EURUSD", "GBPUSD", 0.85),
        ("EURUSD", "USDCHF", -0.90),
        ("EURUSD", "AUDUSD", 0.70),
        ("GBPUSD", "USDCHF", -0.75),
        ("USDJPY", "USDCHF", 0.60),
        ("AUDUSD", "NZDUSD", 0.90),
        ("USDCAD", "USDCHF", 0.65),
        ("EURJPY", "GBPJPY", 0.80),
    ];
    known
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, c)| *c)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_series_returns_zero() {
        let a = vec![1.0, 1.01, 1.02];
        let b = vec![1.0, 1.01, 1.02];
        assert_eq!(weighted_correlation(&a, &b, 0.05), 0.0);
    }

    #[test]
    fn perfectly_correlated_series_returns_near_one() {
        let a: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.001).collect();
        let b: Vec<f64> = (0..30).map(|i| 2.0 + i as f64 * 0.002).collect();
        let corr = weighted_correlation(&a, &b, 0.02);
        assert!(corr > 0.99, "expected near-perfect correlation, got {corr}");
    }

    #[test]
    fn inversely_correlated_series_returns_near_negative_one() {
        let a: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.001).collect();
        let b: Vec<f64> = (0..30).map(|i| 2.0 - i as f64 * 0.002).collect();
        let corr = weighted_correlation(&a, &b, 0.02);
        assert!(corr < -0.99, "expected near-perfect inverse correlation, got {corr}");
    }

    #[test]
    fn zero_variance_series_returns_zero() {
        let a = vec![1.0; 20];
        let b: Vec<f64> = (0..20).map(|i| 1.0 + i as f64 * 0.001).collect();
        assert_eq!(weighted_correlation(&a, &b, 0.05), 0.0);
    }
}
