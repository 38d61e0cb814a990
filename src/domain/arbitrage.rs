//! Arbitrage opportunity data model (spec §3).

use crate::domain::regime::MarketRegime;
use crate::domain::triangle::Triangle;
use crate::domain::types::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub triangle: Triangle,
    pub cross_rate: Decimal,
    pub profit_potential_pct: Decimal,
    pub legs: [Leg; 3],
    pub confidence: f64,
    pub market_regime: MarketRegime,
    pub created_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    /// Build an opportunity id from the triangle's symbols and creation
    /// time, per spec §3 ("triangle symbols plus creation time").
    pub fn make_id(triangle: &Triangle, created_at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}@{}",
            triangle.p1,
            triangle.p2,
            triangle.p3,
            created_at.timestamp_millis()
        )
    }

    /// Decide leg sides per spec §3: `cross_rate > 1` opens BUY, BUY, SELL
    /// on (P1, P2, P3); `cross_rate < 1` opens SELL, SELL, BUY.
    pub fn legs_for(
        triangle: &Triangle,
        cross_rate: Decimal,
        volumes: [Decimal; 3],
    ) -> [Leg; 3] {
        let (s1, s2, s3) = if cross_rate > Decimal::ONE {
            (OrderSide::Buy, OrderSide::Buy, OrderSide::Sell)
        } else {
            (OrderSide::Sell, OrderSide::Sell, OrderSide::Buy)
        };
        [
            Leg { symbol: triangle.p1.as_str().to_string(), side: s1, volume: volumes[0] },
            Leg { symbol: triangle.p2.as_str().to_string(), side: s2, volume: volumes[1] },
            Leg { symbol: triangle.p3.as_str().to_string(), side: s3, volume: volumes[2] },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cross_rate_above_one_opens_buy_buy_sell() {
        use crate::domain::types::Symbol;
        let t = Triangle::try_new(
            Symbol::parse("EURUSD").unwrap(),
            Symbol::parse("USDJPY").unwrap(),
            Symbol::parse("EURJPY").unwrap(),
        )
        .unwrap();
        let legs = ArbitrageOpportunity::legs_for(&t, dec!(1.01), [dec!(0.1), dec!(0.1), dec!(0.1)]);
        assert_eq!(legs[0].side, OrderSide::Buy);
        assert_eq!(legs[1].side, OrderSide::Buy);
        assert_eq!(legs[2].side, OrderSide::Sell);
    }

    #[test]
    fn cross_rate_below_one_opens_sell_sell_buy() {
        use crate::domain::types::Symbol;
        let t = Triangle::try_new(
            Symbol::parse("EURUSD").unwrap(),
            Symbol::parse("USDJPY").unwrap(),
            Symbol::parse("EURJPY").unwrap(),
        )
        .unwrap();
        let legs = ArbitrageOpportunity::legs_for(&t, dec!(0.99), [dec!(0.1), dec!(0.1), dec!(0.1)]);
        assert_eq!(legs[0].side, OrderSide::Sell);
        assert_eq!(legs[1].side, OrderSide::Sell);
        assert_eq!(legs[2].side, OrderSide::Buy);
    }
}
