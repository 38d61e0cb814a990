//! Lot sizing: uniform pip-value and risk-based (spec §4.2).

use crate::application::calculations::pip_value::{calculate_pip_value, RateSource};
use crate::domain::triangle::Triangle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const DEFAULT_LOT_STEP: Decimal = dec!(0.01);
pub const DEFAULT_LOT_FLOOR: Decimal = dec!(0.01);
pub const DEFAULT_LOT_CEILING: Decimal = dec!(1.0);

fn round_to_step(lot: Decimal, step: Decimal, floor: Decimal, ceiling: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return lot.clamp(floor, ceiling);
    }
    let steps = (lot / step).round();
    (steps * step).clamp(floor, ceiling)
}

/// Uniform pip-value sizing: pick a per-leg lot so that pip value is equal
/// across the three legs of `triangle`, scaled by `balance / base_balance`
/// toward `target_pip_value` (spec §4.2).
pub fn uniform_triangle_lots(
    triangle: &Triangle,
    balance: Decimal,
    base_balance: Decimal,
    target_pip_value: Decimal,
    rates: &dyn RateSource,
) -> [Decimal; 3] {
    let scale = if base_balance > Decimal::ZERO { balance / base_balance } else { Decimal::ONE };
    let scaled_target = target_pip_value * scale;

    let mut lots = [Decimal::ZERO; 3];
    for (i, symbol) in triangle.symbols().into_iter().enumerate() {
        // pip value is linear in lot size for a fixed rate snapshot, so
        // solve directly from a unit-lot probe.
        let unit_pip_value = calculate_pip_value(symbol, Decimal::ONE, rates);
        let raw_lot = if unit_pip_value > Decimal::ZERO {
            scaled_target / unit_pip_value
        } else {
            DEFAULT_LOT_FLOOR
        };
        lots[i] = round_to_step(raw_lot, DEFAULT_LOT_STEP, DEFAULT_LOT_FLOOR, DEFAULT_LOT_CEILING);
    }
    lots
}

/// Risk-based sizing (spec §4.2): `risk_amount = balance * risk_pct`,
/// split equally across three legs; `lot = (risk_per_leg /
/// (stop_loss_pips * pip_value_per_0.01_lot)) * 0.01`.
pub fn risk_based_triangle_lots(
    triangle: &Triangle,
    balance: Decimal,
    risk_pct: Decimal,
    stop_loss_pips: Decimal,
    rates: &dyn RateSource,
) -> [Decimal; 3] {
    let risk_amount = balance * risk_pct;
    let risk_per_leg = risk_amount / dec!(3);

    let mut lots = [Decimal::ZERO; 3];
    for (i, symbol) in triangle.symbols().into_iter().enumerate() {
        let pip_value_per_001_lot = calculate_pip_value(symbol, dec!(0.01), rates);
        let raw_lot = if stop_loss_pips > Decimal::ZERO && pip_value_per_001_lot > Decimal::ZERO {
            (risk_per_leg / (stop_loss_pips * pip_value_per_001_lot)) * dec!(0.01)
        } else {
            DEFAULT_LOT_FLOOR
        };
        lots[i] = round_to_step(raw_lot, DEFAULT_LOT_STEP, DEFAULT_LOT_FLOOR, DEFAULT_LOT_CEILING);
    }
    lots
}
