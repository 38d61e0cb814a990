//! Correlation Manager (spec §4.5), grounded on
//! `trading/correlation_manager.py`.
//!
//! `min_corr`/`max_corr` and the estimation heuristic for on-demand
//! correlation have no concrete values/algorithm in the source spec;
//! this crate's choices are recorded in `DESIGN.md`.

use crate::application::calculations::correlation_stats::{combine_timeframe_correlations, default_correlation_table, weighted_correlation};
use crate::application::order_tracker::IndividualOrderTracker;
use crate::domain::correlation::{CorrelationMatrix, HedgeCandidate, HedgeDirection, RecoveryRecord, RecoveryStatus};
use crate::domain::ports::{BrokerGateway, BrokerPosition, OrderRequest, MT5_SUCCESS_RETCODE};
use crate::domain::types::{OrderSide, Timeframe};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct CorrelationManagerConfig {
    pub min_corr: f64,
    pub max_corr: f64,
    pub lookback_bars: usize,
    pub max_recovery_time_hours: i64,
    pub rebalancing_frequency_hours: i64,
    pub portfolio_balance_threshold: f64,
    pub recovery_confidence_threshold: f64,
}

impl Default for CorrelationManagerConfig {
    fn default() -> Self {
        Self {
            min_corr: 0.3,
            max_corr: 0.95,
            lookback_bars: 30 * 24, // ~30 days of H1 bars
            max_recovery_time_hours: 24,
            rebalancing_frequency_hours: 6,
            portfolio_balance_threshold: 0.10,
            recovery_confidence_threshold: 0.6,
        }
    }
}

struct ManagerState {
    matrix: CorrelationMatrix,
    last_matrix_update: Option<DateTime<Utc>>,
    active_recoveries: HashMap<String, RecoveryRecord>,
    last_rebalance: Option<DateTime<Utc>>,
    total_recoveries: u64,
    successful_recoveries: u64,
}

#[derive(Debug, Clone)]
pub struct RecoveryClosure {
    pub order_ref: String,
    pub hedge_ticket: String,
    pub reason: RecoveryStatus,
}

#[derive(Debug, Clone)]
pub struct RebalanceAction {
    pub currency: String,
    pub net_exposure: Decimal,
    pub severity: Decimal,
}

pub struct CorrelationManager {
    broker: Arc<dyn BrokerGateway>,
    tracker: Arc<IndividualOrderTracker>,
    config: CorrelationManagerConfig,
    state: Mutex<ManagerState>,
}

impl CorrelationManager {
    pub fn new(broker: Arc<dyn BrokerGateway>, tracker: Arc<IndividualOrderTracker>, config: CorrelationManagerConfig) -> Self {
        Self {
            broker,
            tracker,
            config,
            state: Mutex::new(ManagerState {
                matrix: CorrelationMatrix::new(),
                last_matrix_update: None,
                active_recoveries: HashMap::new(),
                last_rebalance: None,
                total_recoveries: 0,
                successful_recoveries: 0,
            }),
        }
    }

    /// Recomputes the full pairwise matrix on a 5-minute cadence (spec
    /// §4.5). A no-op if the cadence hasn't elapsed since the last run.
    pub async fn maintain_matrix(&self, pairs: &[String]) {
        {
            let state = self.state.lock().await;
            if let Some(last) = state.last_matrix_update {
                if Utc::now() - last < Duration::minutes(5) {
                    return;
                }
            }
        }

        let mut matrix = CorrelationMatrix::new();
        for i in 0..pairs.len() {
            for j in (i + 1)..pairs.len() {
                let rho = self.compute_pair_correlation(&pairs[i], &pairs[j]).await;
                matrix.set(&pairs[i], &pairs[j], rho);
            }
        }

        let mut state = self.state.lock().await;
        state.matrix = matrix;
        state.last_matrix_update = Some(Utc::now());
        info!("CorrelationManager: matrix refreshed for {} pairs", pairs.len());
    }

    async fn compute_pair_correlation(&self, a: &str, b: &str) -> f64 {
        let mut per_timeframe = [0.0f64; 3];
        for (idx, tf) in [Timeframe::H1, Timeframe::H4, Timeframe::D1].into_iter().enumerate() {
            let candles_a = self.broker.get_historical_data(a, tf, self.config.lookback_bars).await.unwrap_or_default();
            let candles_b = self.broker.get_historical_data(b, tf, self.config.lookback_bars).await.unwrap_or_default();
            if candles_a.len() < 11 || candles_b.len() < 11 {
                continue;
            }
            let closes_a: Vec<f64> = candles_a.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect();
            let closes_b: Vec<f64> = candles_b.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect();
            per_timeframe[idx] = weighted_correlation(&closes_a, &closes_b, 0.05);
        }
        combine_timeframe_correlations(per_timeframe[0], per_timeframe[1], per_timeframe[2])
    }

    /// On-demand lookup with the spec §4.5 fallback chain: cached matrix
    /// entry, else live computation, else a currency-strength estimate from
    /// current tick prices, else the built-in default table.
    pub async fn correlation_for(&self, a: &str, b: &str) -> f64 {
        {
            let state = self.state.lock().await;
            if let Some(rho) = state.matrix.get(a, b) {
                return rho;
            }
        }

        let computed = self.compute_pair_correlation(a, b).await;
        if computed != 0.0 {
            let mut state = self.state.lock().await;
            state.matrix.set(a, b, computed);
            return computed;
        }

        let estimate = estimate_correlation_from_shared_currency(a, b);
        if estimate != 0.0 {
            let mut state = self.state.lock().await;
            state.matrix.set(a, b, estimate);
            return estimate;
        }

        default_correlation_table(a, b)
    }

    /// Hedge candidate search for a losing position (spec §4.5).
    pub async fn find_hedge_candidates(&self, base_pair: &str) -> Vec<HedgeCandidate> {
        let peers: Vec<(String, f64)> = {
            let state = self.state.lock().await;
            state.matrix.peers(base_pair).map(|(k, v)| (k.clone(), *v)).collect()
        };

        let mut candidates = Vec::new();
        for (hedge_pair, rho) in peers {
            let abs_rho = rho.abs();
            if abs_rho < self.config.min_corr || abs_rho > self.config.max_corr {
                continue;
            }

            let inverse = 1.0 / abs_rho;
            let hedge_ratio = if rho < 0.0 { inverse * 1.2 } else { inverse };
            if !(0.5..=2.0).contains(&hedge_ratio) {
                continue;
            }

            let recovery_potential = (abs_rho * (1.0 - (hedge_ratio - inverse).abs() / inverse)).max(0.0);
            let priority_score = abs_rho * recovery_potential;

            candidates.push(HedgeCandidate {
                hedge_pair,
                correlation: rho,
                hedge_ratio,
                recovery_potential,
                direction: HedgeCandidate::direction_for(rho),
                priority_score,
            });
        }

        candidates.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap());
        candidates.truncate(5);
        candidates
    }

    /// `|loss| / (base_price * 0.01)`, scaled by `hedge_ratio`, clamped to
    /// `[0.01, 10.0]` lots (spec §4.5).
    pub fn hedge_volume(loss_amount: Decimal, base_price: Decimal, hedge_ratio: f64) -> Decimal {
        if base_price <= Decimal::ZERO {
            return dec!(0.01);
        }
        let base_volume = (loss_amount.abs() / (base_price * dec!(0.01))).max(Decimal::ZERO);
        let ratio = Decimal::from_f64_retain(hedge_ratio).unwrap_or(Decimal::ONE);
        (base_volume * ratio).clamp(dec!(0.01), dec!(10.0))
    }

    /// Places the hedge order and registers the recovery, gated on an
    /// advisory confidence > 0.6 (spec §4.5).
    pub async fn execute_hedge(
        &self,
        base_ticket: &str,
        base_symbol: &str,
        base_side: OrderSide,
        candidate: &HedgeCandidate,
        hedge_volume: Decimal,
        advisory_confidence: f64,
    ) -> anyhow::Result<Option<String>> {
        if advisory_confidence <= self.config.recovery_confidence_threshold {
            return Ok(None);
        }

        let hedge_side = match candidate.direction {
            HedgeDirection::Opposite => base_side.opposite(),
            HedgeDirection::Same => base_side,
        };
        let comment = format!("R{base_ticket}_{base_symbol}");
        let request = OrderRequest { symbol: candidate.hedge_pair.clone(), side: hedge_side, volume: hedge_volume, comment, magic: 910_000 };

        let result = self.broker.place_order(request).await?;
        if !(result.success && result.retcode == MT5_SUCCESS_RETCODE) {
            let broker_error = crate::domain::errors::BrokerError {
                code: result.retcode,
                message: result.error_msg.clone().unwrap_or_default(),
            };
            warn!("CorrelationManager: hedge order for {} rejected ({:?}): {}", base_symbol, broker_error.kind(), broker_error);
            return Ok(None);
        }

        let Some(ticket) = result.ticket.clone() else { return Ok(None) };
        self.tracker.register_recovery(&ticket, &candidate.hedge_pair, base_ticket, base_symbol).await.ok();

        let order_ref = crate::domain::order::order_key(&ticket, &candidate.hedge_pair);
        let record = RecoveryRecord {
            base_pair: base_symbol.to_string(),
            hedge_pair: candidate.hedge_pair.clone(),
            order_ref: order_ref.clone(),
            ratio: candidate.hedge_ratio,
            correlation: candidate.correlation,
            direction: candidate.direction,
            entry_time: Utc::now(),
            potential: candidate.recovery_potential,
            status: RecoveryStatus::Active,
        };

        let mut state = self.state.lock().await;
        state.active_recoveries.insert(order_ref, record);
        state.total_recoveries += 1;
        info!("CorrelationManager: hedge placed {} -> {} ticket {}", base_symbol, candidate.hedge_pair, ticket);

        Ok(Some(ticket))
    }

    /// Recovery progress monitoring (spec §4.5): timeout at 24h, success
    /// when combined base+hedge PnL >= 0, else left open for adjustment.
    pub async fn monitor_recoveries(&self, positions: &[BrokerPosition]) -> Vec<RecoveryClosure> {
        let snapshot: Vec<(String, RecoveryRecord)> = {
            let state = self.state.lock().await;
            state.active_recoveries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let now = Utc::now();
        let mut closures = Vec::new();
        let mut to_remove = Vec::new();
        let mut to_succeed = Vec::new();

        for (order_ref, record) in &snapshot {
            let Some((hedge_ticket, hedge_symbol)) = order_ref.split_once('_') else { continue };

            if now - record.entry_time >= Duration::hours(self.config.max_recovery_time_hours) {
                closures.push(RecoveryClosure { order_ref: order_ref.clone(), hedge_ticket: hedge_ticket.to_string(), reason: RecoveryStatus::Timeout });
                to_remove.push(order_ref.clone());
                continue;
            }

            let hedge_pnl = positions.iter().find(|p| p.ticket == hedge_ticket).map(|p| p.profit).unwrap_or(Decimal::ZERO);
            let base_key = self.tracker.get(hedge_ticket, hedge_symbol).await.and_then(|o| o.hedging_for);
            let base_pnl = base_key
                .as_ref()
                .and_then(|bk| bk.split_once('_'))
                .and_then(|(bt, _)| positions.iter().find(|p| p.ticket == bt))
                .map(|p| p.profit)
                .unwrap_or(Decimal::ZERO);

            if base_pnl + hedge_pnl >= Decimal::ZERO {
                closures.push(RecoveryClosure { order_ref: order_ref.clone(), hedge_ticket: hedge_ticket.to_string(), reason: RecoveryStatus::Success });
                to_succeed.push(order_ref.clone());
            } else if hedge_pnl > Decimal::ZERO {
                info!("CorrelationManager: hedge {} profitable but insufficient, awaiting adjustment", order_ref);
            }
        }

        if !to_remove.is_empty() || !to_succeed.is_empty() {
            let mut state = self.state.lock().await;
            for order_ref in &to_remove {
                state.active_recoveries.remove(order_ref);
            }
            for order_ref in &to_succeed {
                if state.active_recoveries.remove(order_ref).is_some() {
                    state.successful_recoveries += 1;
                }
            }
        }

        closures
    }

    /// Per-currency net exposure rebalancing (spec §4.5), gated on the
    /// 6-hour cadence.
    pub async fn maybe_rebalance(&self, positions: &[BrokerPosition]) -> Option<Vec<RebalanceAction>> {
        let now = Utc::now();
        {
            let state = self.state.lock().await;
            if let Some(last) = state.last_rebalance {
                if now - last < Duration::hours(self.config.rebalancing_frequency_hours) {
                    return None;
                }
            }
        }

        let mut net_exposure: HashMap<String, Decimal> = HashMap::new();
        for pos in positions {
            if pos.symbol.len() != 6 {
                continue;
            }
            let signed = match pos.side {
                OrderSide::Buy => pos.volume,
                OrderSide::Sell => -pos.volume,
            };
            *net_exposure.entry(pos.symbol[0..3].to_string()).or_insert(Decimal::ZERO) += signed;
            *net_exposure.entry(pos.symbol[3..6].to_string()).or_insert(Decimal::ZERO) -= signed;
        }

        let mut state = self.state.lock().await;
        state.last_rebalance = Some(now);

        let total_exposure: Decimal = net_exposure.values().map(|v| v.abs()).sum();
        if total_exposure == Decimal::ZERO {
            return None;
        }

        let max_abs = net_exposure.values().map(|v| v.abs()).max().unwrap_or(Decimal::ZERO);
        let ratio = (max_abs / total_exposure).to_f64().unwrap_or(0.0);
        if ratio <= self.config.portfolio_balance_threshold {
            return None;
        }

        let mut actions: Vec<RebalanceAction> = net_exposure
            .into_iter()
            .map(|(currency, net_exposure)| RebalanceAction { severity: net_exposure.abs(), currency, net_exposure })
            .collect();
        actions.sort_by(|a, b| b.severity.cmp(&a.severity));
        Some(actions)
    }

    pub async fn total_recoveries(&self) -> u64 {
        self.state.lock().await.total_recoveries
    }

    pub async fn successful_recoveries(&self) -> u64 {
        self.state.lock().await.successful_recoveries
    }
}

/// Estimation fallback when no historical correlation can be computed: two
/// pairs sharing a currency leg move together (or, sharing base-vs-quote
/// across the two symbols, apart). No magnitude claim beyond a coarse
/// +/-0.5, per the unspecified "currency-strength heuristic" in spec §4.5.
fn estimate_correlation_from_shared_currency(a: &str, b: &str) -> f64 {
    if a.len() != 6 || b.len() != 6 {
        return 0.0;
    }
    let (a_base, a_quote) = (&a[0..3], &a[3..6]);
    let (b_base, b_quote) = (&b[0..3], &b[3..6]);

    if a_base == b_base && a_quote == b_quote {
        1.0
    } else if a_base == b_base || a_quote == b_quote {
        0.5
    } else if a_base == b_quote || a_quote == b_base {
        -0.5
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_base_currency_estimates_positive() {
        assert_eq!(estimate_correlation_from_shared_currency("EURUSD", "EURGBP"), 0.5);
    }

    #[test]
    fn inverse_leg_estimates_negative() {
        assert_eq!(estimate_correlation_from_shared_currency("EURUSD", "USDJPY"), -0.5);
    }

    #[test]
    fn unrelated_pairs_estimate_zero() {
        assert_eq!(estimate_correlation_from_shared_currency("EURGBP", "AUDNZD"), 0.0);
    }

    #[test]
    fn hedge_volume_respects_clamp_bounds() {
        let v = CorrelationManager::hedge_volume(dec!(100000), dec!(1.1), 1.0);
        assert_eq!(v, dec!(10.0));
        let v_small = CorrelationManager::hedge_volume(dec!(0.001), dec!(1.1), 1.0);
        assert_eq!(v_small, dec!(0.01));
    }
}
