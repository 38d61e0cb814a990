//! Active Group: the atomic unit of arbitrage execution (spec §3).

use crate::domain::triangle::Triangle;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Active,
    Closing,
    Closed,
    Expired,
}

/// One placed leg of a group, as reported back by the broker gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPosition {
    pub ticket: String,
    pub symbol: String,
}

/// A recovery order hung off this group's chain (spec §3: `recovery_chain`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryLink {
    pub order_key: String,
    pub hedge_symbol: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveGroup {
    pub group_id: String,
    pub triangle: Triangle,
    pub positions: Vec<GroupPosition>,
    pub created_at: DateTime<Utc>,
    pub status: GroupStatus,
    pub recovery_chain: Vec<RecoveryLink>,
}

/// Groups expire 24h after creation, per spec §3/§8 ("exactly 24h 0s is expired").
pub const GROUP_TTL: Duration = Duration::hours(24);

impl ActiveGroup {
    pub fn new(group_id: String, triangle: Triangle, positions: Vec<GroupPosition>, now: DateTime<Utc>) -> Self {
        Self {
            group_id,
            triangle,
            positions,
            created_at: now,
            status: GroupStatus::Active,
            recovery_chain: Vec::new(),
        }
    }

    /// True only while the group is `Active` AND holds exactly its three
    /// original positions (spec §3 invariant).
    pub fn is_active_with_three_legs(&self) -> bool {
        self.status == GroupStatus::Active && self.positions.len() == 3
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= GROUP_TTL
    }

    /// Aggregate PnL closure rule (spec §4.4): closed when the sum of
    /// broker-reported profit over the three legs and any recovery
    /// children is >= 0.
    pub fn should_close_on_pnl(aggregate_pnl: Decimal) -> bool {
        aggregate_pnl >= Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Symbol;
    use rust_decimal_macros::dec;

    fn triangle() -> Triangle {
        Triangle::try_new(
            Symbol::parse("EURUSD").unwrap(),
            Symbol::parse("USDJPY").unwrap(),
            Symbol::parse("EURJPY").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn exactly_24h_is_expired() {
        let created = Utc::now() - Duration::hours(24);
        let g = ActiveGroup::new("G1".into(), triangle(), vec![], created);
        assert!(g.is_expired_at(created + Duration::hours(24)));
    }

    #[test]
    fn just_under_24h_is_not_expired() {
        let created = Utc::now();
        let g = ActiveGroup::new("G1".into(), triangle(), vec![], created);
        assert!(!g.is_expired_at(created + Duration::hours(24) - Duration::seconds(1)));
    }

    #[test]
    fn pnl_exactly_zero_closes() {
        assert!(ActiveGroup::should_close_on_pnl(dec!(0)));
        assert!(ActiveGroup::should_close_on_pnl(dec!(3.2)));
        assert!(!ActiveGroup::should_close_on_pnl(dec!(-0.01)));
    }
}
