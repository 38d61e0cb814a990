//! Account state refreshed per coordinator tick (spec §3, §4.6).

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy)]
pub struct AccountState {
    pub balance: Decimal,
    pub equity: Decimal,
    pub free_margin: Decimal,
}

/// Sizing parameters derived from account state and pushed into the
/// Detector and Correlation Manager each tick (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct SizingParams {
    pub balance: Decimal,
    pub equity: Decimal,
    pub free_margin: Decimal,
    pub target_pip_value: Decimal,
    pub balance_multiplier: Decimal,
}

impl SizingParams {
    /// `balance_multiplier = balance / 10_000`, `target_pip_value = 5.0 *
    /// balance_multiplier` (spec §4.6).
    pub fn from_account(account: AccountState) -> Self {
        use rust_decimal_macros::dec;
        let balance_multiplier = account.balance / dec!(10_000);
        let target_pip_value = dec!(5.0) * balance_multiplier;
        Self {
            balance: account.balance,
            equity: account.equity,
            free_margin: account.free_margin,
            target_pip_value,
            balance_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sizing_params_scale_with_balance() {
        let account = AccountState { balance: dec!(20_000), equity: dec!(20_000), free_margin: dec!(18_000) };
        let sizing = SizingParams::from_account(account);
        assert_eq!(sizing.balance_multiplier, dec!(2));
        assert_eq!(sizing.target_pip_value, dec!(10.0));
    }
}
