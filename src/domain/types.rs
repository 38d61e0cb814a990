//! Primitive trading types shared across every subsystem.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The major/minor currency set the core operates over (spec §3).
pub const MAJOR_CURRENCIES: [&str; 8] = [
    "EUR", "USD", "GBP", "JPY", "CHF", "AUD", "CAD", "NZD",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Timeframes recognized by the broker gateway's historical-data call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        write!(f, "{s}")
    }
}

/// A canonical six-letter currency pair, e.g. `EURUSD`.
///
/// Invariants (spec §3): uppercase, length 6, base != quote, both legs in
/// `MAJOR_CURRENCIES` for core operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Parse a canonical symbol, validating the §3 invariants. Returns
    /// `None` rather than an error type: callers treat an invalid symbol
    /// the same way they'd treat "not in the major/minor set" — simply
    /// excluded from triangle generation.
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.len() != 6 {
            return None;
        }
        let base = &upper[0..3];
        let quote = &upper[3..6];
        if base == quote {
            return None;
        }
        Some(Symbol(upper))
    }

    /// Parse without requiring both legs to be in the major/minor set —
    /// used when ingesting arbitrary broker symbol lists before filtering.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.len() != 6 {
            return None;
        }
        if upper[0..3] == upper[3..6] {
            return None;
        }
        Some(Symbol(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        &self.0[0..3]
    }

    pub fn quote(&self) -> &str {
        &self.0[3..6]
    }

    pub fn is_major_minor(&self) -> bool {
        MAJOR_CURRENCIES.contains(&self.base()) && MAJOR_CURRENCIES.contains(&self.quote())
    }

    /// `0.01` for JPY-quoted pairs, `0.0001` otherwise (spec §3).
    pub fn pip_size(&self) -> Decimal {
        use rust_decimal_macros::dec;
        if self.quote() == "JPY" {
            dec!(0.01)
        } else {
            dec!(0.0001)
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(bid, ask, timestamp)` for a symbol (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Spread expressed in pips for the given symbol.
    pub fn spread_pips(&self, symbol: &Symbol) -> Decimal {
        (self.ask - self.bid) / symbol.pip_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_parse_validates_invariants() {
        assert!(Symbol::parse("eurusd").is_some());
        assert_eq!(Symbol::parse("eurusd").unwrap().as_str(), "EURUSD");
        assert!(Symbol::parse("EURUSD").unwrap().is_major_minor());
        assert!(Symbol::parse("EUREUR").is_none(), "base == quote must be rejected");
        assert!(Symbol::parse("EU").is_none(), "wrong length must be rejected");
    }

    #[test]
    fn pip_size_is_jpy_aware() {
        let eurusd = Symbol::parse("EURUSD").unwrap();
        let usdjpy = Symbol::parse("USDJPY").unwrap();
        use rust_decimal_macros::dec;
        assert_eq!(eurusd.pip_size(), dec!(0.0001));
        assert_eq!(usdjpy.pip_size(), dec!(0.01));
    }

    #[test]
    fn spread_pips_uses_symbol_pip_size() {
        use rust_decimal_macros::dec;
        let usdjpy = Symbol::parse("USDJPY").unwrap();
        let q = Quote {
            bid: dec!(150.000),
            ask: dec!(150.020),
            timestamp: Utc::now(),
        };
        assert_eq!(q.spread_pips(&usdjpy), dec!(2.0));
    }
}
