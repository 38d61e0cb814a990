//! Engine configuration parsing from environment variables (spec §6.2),
//! organized the way this codebase's `config/` module splits `RiskEnvConfig`/
//! `ObservabilityEnvConfig` by domain. `EngineConfig::from_env` is the single
//! aggregate entry point `main.rs` calls, mirroring `Config::from_env`.

use anyhow::{Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::env;

#[derive(Debug, Clone, Copy)]
pub struct PositionSizingConfig {
    pub use_risk_based_sizing: bool,
    pub risk_per_trade_percent: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct ArbitrageParamsConfig {
    pub max_spread_ratio: f64,
    pub min_volume_threshold: f64,
    pub min_confidence: f64,
    pub min_order_interval_secs: i64,
    pub daily_order_cap: u32,
    pub commission_rate: Decimal,
    pub slippage_pct: Decimal,
    pub stop_loss_pips: Decimal,
    pub max_active_triangles: usize,
    pub trailing_stop_enabled: bool,
    pub lock_profit_percentage: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryParamsConfig {
    pub min_loss_percent: f64,
    pub max_chain_depth: usize,
    pub min_corr: f64,
    pub max_corr: f64,
    pub lookback_bars: usize,
    pub max_recovery_time_hours: i64,
    pub rebalancing_frequency_hours: i64,
    pub portfolio_balance_threshold: f64,
    pub recovery_confidence_threshold: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub position_sizing: PositionSizingConfig,
    pub arbitrage_params: ArbitrageParamsConfig,
    pub recovery_params: RecoveryParamsConfig,
    pub observability: ObservabilityConfig,
    pub coordinator_tick_secs: u64,
    pub symbols: Vec<String>,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let position_sizing = PositionSizingConfig {
            use_risk_based_sizing: parse_bool("USE_RISK_BASED_SIZING", false),
            risk_per_trade_percent: parse_decimal("RISK_PER_TRADE_PERCENT", "0.015")?,
        };

        let arbitrage_params = ArbitrageParamsConfig {
            max_spread_ratio: parse_f64("MAX_SPREAD_RATIO", 0.3)?,
            min_volume_threshold: parse_f64("MIN_VOLUME_THRESHOLD", 0.3)?,
            min_confidence: parse_f64("MIN_CONFIDENCE", 0.75)?,
            min_order_interval_secs: parse_i64("MIN_ORDER_INTERVAL_SECS", 10)?,
            daily_order_cap: parse_u32("DAILY_ORDER_CAP", 50)?,
            commission_rate: parse_decimal("COMMISSION_RATE", "0.00007")?,
            slippage_pct: parse_decimal("SLIPPAGE_PCT", "0.01")?,
            stop_loss_pips: parse_decimal("STOP_LOSS_PIPS", "50")?,
            max_active_triangles: parse_usize("MAX_ACTIVE_TRIANGLES", 1)?,
            trailing_stop_enabled: parse_bool("TRAILING_STOP_ENABLED", false),
            lock_profit_percentage: parse_f64("LOCK_PROFIT_PERCENTAGE", 0.5)?,
        };

        let recovery_params = RecoveryParamsConfig {
            min_loss_percent: parse_f64("MIN_LOSS_PERCENT", 0.5)?,
            max_chain_depth: parse_usize("MAX_CHAIN_DEPTH", crate::application::order_tracker::DEFAULT_MAX_CHAIN_DEPTH)?,
            min_corr: parse_f64("MIN_CORR", 0.3)?,
            max_corr: parse_f64("MAX_CORR", 0.95)?,
            lookback_bars: parse_usize("CORRELATION_LOOKBACK_BARS", 30 * 24)?,
            max_recovery_time_hours: parse_i64("MAX_RECOVERY_TIME_HOURS", 24)?,
            rebalancing_frequency_hours: parse_i64("REBALANCING_FREQUENCY_HOURS", 6)?,
            portfolio_balance_threshold: parse_f64("PORTFOLIO_BALANCE_THRESHOLD", 0.10)?,
            recovery_confidence_threshold: parse_f64("RECOVERY_CONFIDENCE_THRESHOLD", 0.6)?,
        };

        let observability = ObservabilityConfig {
            enabled: parse_bool("OBSERVABILITY_ENABLED", true),
            port: env::var("OBSERVABILITY_PORT").unwrap_or_else(|_| "9090".to_string()).parse::<u16>().unwrap_or(9090),
        };

        let symbols_str = env::var("SYMBOLS").unwrap_or_else(|_| {
            "EURUSD,GBPUSD,USDJPY,USDCHF,AUDUSD,USDCAD,NZDUSD,EURGBP,EURJPY,GBPJPY".to_string()
        });
        let symbols = symbols_str.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect();

        Ok(Self {
            position_sizing,
            arbitrage_params,
            recovery_params,
            observability,
            coordinator_tick_secs: parse_u64("COORDINATOR_TICK_SECS", 30)?,
            symbols,
        })
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<bool>().unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<f64>().context(format!("failed to parse {key}"))
}

fn parse_i64(key: &str, default: i64) -> Result<i64> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<i64>().context(format!("failed to parse {key}"))
}

fn parse_u32(key: &str, default: u32) -> Result<u32> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u32>().context(format!("failed to parse {key}"))
}

fn parse_u64(key: &str, default: u64) -> Result<u64> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u64>().context(format!("failed to parse {key}"))
}

fn parse_usize(key: &str, default: usize) -> Result<usize> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<usize>().context(format!("failed to parse {key}"))
}

fn parse_decimal(key: &str, default: &str) -> Result<Decimal> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<f64>()
        .ok()
        .and_then(Decimal::from_f64)
        .context(format!("failed to parse {key} as a decimal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_env_overrides() {
        let config = EngineConfig::from_env().expect("defaults should parse");
        assert_eq!(config.arbitrage_params.max_active_triangles, 1);
        assert_eq!(config.recovery_params.max_chain_depth, 3);
        assert_eq!(config.symbols.len(), 10);
    }
}
