//! Arbitrage net-of-cost percentage (spec §4.2).

use crate::domain::errors::CalculationError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Valid price range, spec §4.2.
pub const MIN_VALID_PRICE: Decimal = dec!(0.0001);
pub const MAX_VALID_PRICE: Decimal = dec!(1000);

fn price_is_valid(p: Decimal) -> bool {
    p > Decimal::ZERO && p >= MIN_VALID_PRICE && p <= MAX_VALID_PRICE
}

/// Inputs for the net arbitrage percentage calculation.
#[derive(Debug, Clone, Copy)]
pub struct ArbitrageCostInputs {
    pub p1: Decimal,
    pub p2: Decimal,
    pub p3: Decimal,
    /// Spreads in pips for each leg; zero if not supplied.
    pub spread1_pips: Decimal,
    pub spread2_pips: Decimal,
    pub spread3_pips: Decimal,
    pub commission_rate: Decimal,
    pub slippage_pct: Decimal,
    pub minimum_threshold_pct: Decimal,
}

/// `net = (P3 - P1*P2)/(P1*P2) * 100 - spread_cost_pct - commission_pct -
/// slippage_pct`. Returns `net` if `net > threshold`, else `0` (spec §4.2).
///
/// Validation: all prices must be > 0, finite, within
/// `[0.0001, 1000]` — invalid input returns `0` rather than propagating,
/// per spec §7 ("pure functions return 0/None").
pub fn calculate_arbitrage_net_pct(inputs: ArbitrageCostInputs) -> Decimal {
    for p in [inputs.p1, inputs.p2, inputs.p3] {
        if !price_is_valid(p) {
            debug!("arbitrage_cost: {}", CalculationError::PriceOutOfRange(p));
            return Decimal::ZERO;
        }
    }

    let theoretical_price = inputs.p1 * inputs.p2;
    if theoretical_price == Decimal::ZERO {
        return Decimal::ZERO;
    }

    let theoretical_arbitrage_pct = (inputs.p3 - theoretical_price) / theoretical_price * dec!(100);

    let spread_cost_pct =
        (inputs.spread1_pips + inputs.spread2_pips + inputs.spread3_pips) / inputs.p3 * dec!(100);
    let commission_cost_pct = inputs.commission_rate * dec!(3) * dec!(100);
    let slippage_cost_pct = inputs.slippage_pct;

    let total_cost_pct = spread_cost_pct + commission_cost_pct + slippage_cost_pct;
    let net = theoretical_arbitrage_pct - total_cost_pct;

    if net > inputs.minimum_threshold_pct {
        net
    } else {
        Decimal::ZERO
    }
}

/// The raw (zero-cost) cross-rate percentage deviation, used by tests and
/// by `confidence` scoring which needs the pre-cost magnitude.
pub fn cross_rate(p1: Decimal, p2: Decimal, p3: Decimal) -> Option<Decimal> {
    if p3 == Decimal::ZERO {
        return None;
    }
    Some(p1 * p2 / p3)
}

pub fn profit_potential_pct(cross_rate: Decimal) -> Decimal {
    (cross_rate - Decimal::ONE).abs() * dec!(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_costs_equals_raw_theoretical_percentage() {
        // spec §8: "if all costs and spreads are zero, net equals raw theoretical percentage"
        let p1 = dec!(1.10000);
        let p2 = dec!(150.000);
        let p3 = dec!(165.500);
        let inputs = ArbitrageCostInputs {
            p1,
            p2,
            p3,
            spread1_pips: dec!(0),
            spread2_pips: dec!(0),
            spread3_pips: dec!(0),
            commission_rate: dec!(0),
            slippage_pct: dec!(0),
            minimum_threshold_pct: dec!(0),
        };
        let theoretical = (p3 - p1 * p2) / (p1 * p2) * dec!(100);
        let net = calculate_arbitrage_net_pct(inputs);
        assert_eq!(net, theoretical);
    }

    #[test]
    fn below_threshold_returns_zero() {
        let inputs = ArbitrageCostInputs {
            p1: dec!(1.1),
            p2: dec!(150.0),
            p3: dec!(165.0),
            spread1_pips: dec!(0),
            spread2_pips: dec!(0),
            spread3_pips: dec!(0),
            commission_rate: dec!(0),
            slippage_pct: dec!(0),
            minimum_threshold_pct: dec!(10.0),
        };
        assert_eq!(calculate_arbitrage_net_pct(inputs), Decimal::ZERO);
    }

    #[test]
    fn invalid_price_returns_zero() {
        let inputs = ArbitrageCostInputs {
            p1: dec!(-1.0),
            p2: dec!(150.0),
            p3: dec!(165.0),
            spread1_pips: dec!(0),
            spread2_pips: dec!(0),
            spread3_pips: dec!(0),
            commission_rate: dec!(0),
            slippage_pct: dec!(0),
            minimum_threshold_pct: dec!(0),
        };
        assert_eq!(calculate_arbitrage_net_pct(inputs), Decimal::ZERO);
    }

    #[test]
    fn cross_rate_exactly_one_yields_zero_profit_potential() {
        // spec §8 boundary: cross_rate exactly 1 -> profit_potential 0, must not execute.
        assert_eq!(profit_potential_pct(dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn scenario_1_clean_detection_cross_rate() {
        let cr = cross_rate(dec!(1.10000), dec!(150.000), dec!(165.500)).unwrap();
        // 1.10000 * 150.000 / 165.500 = 0.996979...
        assert!((cr - dec!(0.99698)).abs() < dec!(0.0001));
        let pct = profit_potential_pct(cr);
        assert!((pct - dec!(0.302)).abs() < dec!(0.01));
    }
}
