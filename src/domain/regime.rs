//! Market regime classification and regime-dependent presets (spec §4.4).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    Volatile,
    Trending,
    Ranging,
    Normal,
}

impl Default for MarketRegime {
    fn default() -> Self {
        MarketRegime::Normal
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRegime::Volatile => "volatile",
            MarketRegime::Trending => "trending",
            MarketRegime::Ranging => "ranging",
            MarketRegime::Normal => "normal",
        };
        write!(f, "{s}")
    }
}

/// Threshold (in pips) and detection timeout associated with a regime.
#[derive(Debug, Clone, Copy)]
pub struct RegimePreset {
    pub threshold_pips: Decimal,
    pub timeout_ms: u64,
}

impl MarketRegime {
    pub fn preset(self) -> RegimePreset {
        match self {
            MarketRegime::Volatile => RegimePreset { threshold_pips: dec!(1.2), timeout_ms: 300 },
            MarketRegime::Trending => RegimePreset { threshold_pips: dec!(1.0), timeout_ms: 300 },
            MarketRegime::Ranging => RegimePreset { threshold_pips: dec!(0.8), timeout_ms: 300 },
            MarketRegime::Normal => RegimePreset { threshold_pips: dec!(0.8), timeout_ms: 300 },
        }
    }
}
