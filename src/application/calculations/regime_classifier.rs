//! Market regime classification (spec §4.4/§4.6), grounded on
//! `regime/detector.rs`'s ADX/volatility-driven `classify` function, scaled
//! down to the four regimes `domain::regime::MarketRegime` defines: trend
//! strength (simplified directional index) against a realized-volatility
//! band, first match wins, default `Normal` when nothing fires.

use crate::domain::ports::Candle;
use crate::domain::regime::MarketRegime;
use rust_decimal::prelude::ToPrimitive;

/// Annualization-free realized volatility: stdev of close-to-close percent
/// returns over the window, expressed in percent.
fn realized_volatility_pct(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt() * 100.0
}

/// A simplified directional index in `[0, 100]`: ratio of net directional
/// movement to total movement over the window, scaled like ADX's
/// trend-strength reading without the full smoothing machinery.
fn trend_strength(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }
    let net = (closes[closes.len() - 1] - closes[0]).abs();
    let total: f64 = closes.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    (net / total * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeMetrics {
    pub volatility_pct: f64,
    pub trend_strength: f64,
}

/// Classifies the regime for a single pair's recent candles. Evaluated
/// top-to-bottom, first match wins:
///   1. Volatile  — volatility_pct > 0.35
///   2. Trending  — trend_strength > 55.0
///   3. Ranging   — volatility_pct < 0.08 && trend_strength < 25.0
///   4. Normal    — otherwise
pub fn classify_regime(candles: &[Candle]) -> (MarketRegime, RegimeMetrics) {
    let closes: Vec<f64> = candles.iter().filter_map(|c| c.close.to_f64()).collect();
    let volatility_pct = realized_volatility_pct(&closes);
    let trend_strength = trend_strength(&closes);
    let metrics = RegimeMetrics { volatility_pct, trend_strength };

    if closes.len() < 11 {
        return (MarketRegime::Normal, metrics);
    }

    let regime = if volatility_pct > 0.35 {
        MarketRegime::Volatile
    } else if trend_strength > 55.0 {
        MarketRegime::Trending
    } else if volatility_pct < 0.08 && trend_strength < 25.0 {
        MarketRegime::Ranging
    } else {
        MarketRegime::Normal
    };

    (regime, metrics)
}

/// Aggregates per-pair classifications across a basket into one portfolio
/// regime: the most frequently classified regime wins; ties break toward
/// the more conservative ordering `Volatile > Trending > Ranging > Normal`.
pub fn classify_portfolio_regime(per_pair: &[(MarketRegime, RegimeMetrics)]) -> MarketRegime {
    if per_pair.is_empty() {
        return MarketRegime::Normal;
    }

    let mut volatile = 0;
    let mut trending = 0;
    let mut ranging = 0;
    let mut normal = 0;
    for (regime, _) in per_pair {
        match regime {
            MarketRegime::Volatile => volatile += 1,
            MarketRegime::Trending => trending += 1,
            MarketRegime::Ranging => ranging += 1,
            MarketRegime::Normal => normal += 1,
        }
    }

    let max = volatile.max(trending).max(ranging).max(normal);
    if volatile == max {
        MarketRegime::Volatile
    } else if trending == max {
        MarketRegime::Trending
    } else if ranging == max {
        MarketRegime::Ranging
    } else {
        MarketRegime::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(close: Decimal) -> Candle {
        Candle { time: Utc::now(), open: close, high: close, low: close, close }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes.iter().map(|c| candle(Decimal::from_f64_retain(*c).unwrap())).collect()
    }

    #[test]
    fn short_series_defaults_to_normal() {
        let candles = series(&[1.0, 1.001, 1.002]);
        let (regime, _) = classify_regime(&candles);
        assert_eq!(regime, MarketRegime::Normal);
    }

    #[test]
    fn steadily_trending_series_is_trending() {
        let closes: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.001).collect();
        let candles = series(&closes);
        let (regime, _) = classify_regime(&candles);
        assert_eq!(regime, MarketRegime::Trending);
    }

    #[test]
    fn choppy_flat_series_is_ranging() {
        let closes: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 1.0000 } else { 1.00005 })
            .collect();
        let candles = series(&closes);
        let (regime, _) = classify_regime(&candles);
        assert_eq!(regime, MarketRegime::Ranging);
    }

    #[test]
    fn wide_swinging_series_is_volatile() {
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.00 } else { 1.50 }).collect();
        let candles = series(&closes);
        let (regime, _) = classify_regime(&candles);
        assert_eq!(regime, MarketRegime::Volatile);
    }

    #[test]
    fn portfolio_regime_takes_majority_vote() {
        let metrics = RegimeMetrics { volatility_pct: 0.0, trend_strength: 0.0 };
        let per_pair = vec![
            (MarketRegime::Trending, metrics),
            (MarketRegime::Trending, metrics),
            (MarketRegime::Ranging, metrics),
        ];
        assert_eq!(classify_portfolio_regime(&per_pair), MarketRegime::Trending);
    }

    #[test]
    fn empty_portfolio_defaults_to_normal() {
        assert_eq!(classify_portfolio_regime(&[]), MarketRegime::Normal);
    }
}
