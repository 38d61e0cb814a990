//! Pip value per lot by currency class (spec §4.2), grounded on
//! `utils/calculations.py::calculate_pip_value`.

use crate::domain::types::Symbol;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Approximate fallback exchange rates, used when no live rate is
/// available (matches the Python original's `fallback_rates` table).
pub fn fallback_rate(symbol: &str) -> Decimal {
    let table: HashMap<&str, Decimal> = HashMap::from([
        ("EURUSD", dec!(1.10)),
        ("GBPUSD", dec!(1.27)),
        ("AUDUSD", dec!(0.67)),
        ("NZDUSD", dec!(0.62)),
        ("USDJPY", dec!(149.50)),
        ("USDCAD", dec!(1.35)),
        ("USDCHF", dec!(0.92)),
    ]);
    table.get(symbol).copied().unwrap_or(dec!(1.0))
}

/// Source of live exchange rates for pip-value cross computation; the
/// caller supplies current quotes, falling back to the approximate table
/// above when a rate is unavailable.
pub trait RateSource {
    fn rate(&self, symbol: &str) -> Option<Decimal>;
}

pub struct RateTable(pub HashMap<String, Decimal>);

impl RateSource for RateTable {
    fn rate(&self, symbol: &str) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }
}

fn resolve_rate(source: &dyn RateSource, symbol: &str) -> Decimal {
    source.rate(symbol).unwrap_or_else(|| fallback_rate(symbol))
}

/// `contract_size = 100_000 * lot_size`; pip value by currency-class case
/// (spec §4.2):
/// - Quote = USD: `pip_value = contract_size * pip_size`.
/// - Quote = JPY: `= (contract_size * pip_size) / USDJPY`.
/// - Base = USD, quote = other: `= (contract_size * pip_size) / USDxxx`.
/// - Cross (neither side USD): `= contract_size * pip_size * (quote->USD_rate)`.
pub fn calculate_pip_value(symbol: &Symbol, lot_size: Decimal, rates: &dyn RateSource) -> Decimal {
    let lot_size = if lot_size <= Decimal::ZERO { dec!(0.01) } else { lot_size };
    let contract_size = dec!(100_000) * lot_size;
    let pip_size = symbol.pip_size();

    if symbol.quote() == "USD" {
        contract_size * pip_size
    } else if symbol.quote() == "JPY" {
        let usd_jpy = resolve_rate(rates, "USDJPY");
        (contract_size * pip_size) / usd_jpy
    } else if symbol.base() == "USD" {
        let usd_xxx = resolve_rate(rates, symbol.as_str());
        (contract_size * pip_size) / usd_xxx
    } else {
        // Cross pair: quote->USD rate depends on which side of its own USD
        // pair the quote currency quotes from. CAD and CHF are quoted as
        // USD<ccy> (no direct <ccy>USD pair), so their rate is the
        // reciprocal of USDCAD/USDCHF; EUR/GBP/AUD/NZD quote directly
        // against USD, so <ccy>USD is used as-is.
        let quote_to_usd = match symbol.quote() {
            "CAD" => Decimal::ONE.checked_div(resolve_rate(rates, "USDCAD")).unwrap_or(Decimal::ONE),
            "CHF" => Decimal::ONE.checked_div(resolve_rate(rates, "USDCHF")).unwrap_or(Decimal::ONE),
            other => resolve_rate(rates, &format!("{other}USD")),
        };
        contract_size * pip_size * quote_to_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;
    impl RateSource for Empty {
        fn rate(&self, _symbol: &str) -> Option<Decimal> {
            None
        }
    }

    #[test]
    fn usd_quote_pip_value() {
        let sym = Symbol::parse("EURUSD").unwrap();
        // 100_000 * 0.01 * 0.0001 = 0.1 -> wait lot_size default 0.01
        let pv = calculate_pip_value(&sym, dec!(0.01), &Empty);
        assert_eq!(pv, dec!(100_000) * dec!(0.01) * dec!(0.0001));
    }

    #[test]
    fn jpy_quote_uses_usdjpy_rate() {
        let sym = Symbol::parse("EURJPY").unwrap();
        let pv = calculate_pip_value(&sym, dec!(1.0), &Empty);
        let expected = (dec!(100_000) * dec!(1.0) * dec!(0.01)) / fallback_rate("USDJPY");
        assert_eq!(pv, expected);
    }

    #[test]
    fn usd_base_uses_usdxxx_rate() {
        let sym = Symbol::parse("USDCHF").unwrap();
        let pv = calculate_pip_value(&sym, dec!(1.0), &Empty);
        let expected = (dec!(100_000) * dec!(1.0) * dec!(0.0001)) / fallback_rate("USDCHF");
        assert_eq!(pv, expected);
    }

    #[test]
    fn cross_pair_with_chf_quote_uses_usdchf_reciprocal() {
        let sym = Symbol::parse("EURCHF").unwrap();
        let pv = calculate_pip_value(&sym, dec!(1.0), &Empty);
        let quote_to_usd = Decimal::ONE / fallback_rate("USDCHF");
        let expected = dec!(100_000) * dec!(1.0) * dec!(0.0001) * quote_to_usd;
        assert_eq!(pv, expected);
    }

    #[test]
    fn cross_pair_with_cad_quote_uses_usdcad_reciprocal() {
        let sym = Symbol::parse("GBPCAD").unwrap();
        let pv = calculate_pip_value(&sym, dec!(1.0), &Empty);
        let quote_to_usd = Decimal::ONE / fallback_rate("USDCAD");
        let expected = dec!(100_000) * dec!(1.0) * dec!(0.0001) * quote_to_usd;
        assert_eq!(pv, expected);
    }

    #[test]
    fn cross_pair_with_eur_quote_uses_eurusd_directly() {
        let sym = Symbol::parse("GBPEUR").unwrap();
        let pv = calculate_pip_value(&sym, dec!(1.0), &Empty);
        let expected = dec!(100_000) * dec!(1.0) * dec!(0.0001) * fallback_rate("EURUSD");
        assert_eq!(pv, expected);
    }

    #[test]
    fn invalid_lot_size_falls_back_to_default() {
        let sym = Symbol::parse("EURUSD").unwrap();
        let pv_zero = calculate_pip_value(&sym, dec!(0), &Empty);
        let pv_default = calculate_pip_value(&sym, dec!(0.01), &Empty);
        assert_eq!(pv_zero, pv_default);
    }
}
