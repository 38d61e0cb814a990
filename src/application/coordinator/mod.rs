//! Adaptive Coordinator (spec §4.6), grounded on the teacher's
//! `MarketScanner::run` tick-loop idiom (`application/agents/scanner.rs`):
//! a `tokio::time::interval` driving a `tokio::select!` loop, gated by a
//! `CancellationToken` instead of a channel send failure.
//!
//! Regime classification itself has no counterpart in the source
//! specification beyond "current regime" being an input the coordinator
//! refreshes; this crate grounds the classifier on `regime/detector.rs`'s
//! ADX/volatility-driven approach (`calculations::regime_classifier`),
//! scaled down to the four regimes spec §4.4 defines. Recorded in
//! `DESIGN.md`.

use crate::application::arbitrage_detector::ArbitrageDetector;
use crate::application::calculations::pip_value::RateTable;
use crate::application::calculations::regime_classifier::{classify_portfolio_regime, classify_regime};
use crate::application::correlation_manager::CorrelationManager;
use crate::application::order_tracker::IndividualOrderTracker;
use crate::application::symbol_mapper::SymbolMapper;
use crate::domain::account::{AccountState, SizingParams};
use crate::domain::ports::{BrokerGateway, BrokerPosition};
use crate::domain::regime::MarketRegime;
use crate::domain::triangle::{generate_triangles, Triangle};
use crate::domain::types::{Symbol, Timeframe};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::symbol_mapping_store::SymbolMappingStore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub tick_interval: Duration,
    pub symbols: Vec<String>,
    pub min_loss_percent: f64,
    pub regime_lookback_bars: usize,
}

pub struct Coordinator {
    broker: Arc<dyn BrokerGateway>,
    tracker: Arc<IndividualOrderTracker>,
    detector: Arc<ArbitrageDetector>,
    correlation: Arc<CorrelationManager>,
    metrics: Arc<Metrics>,
    config: CoordinatorConfig,
    triangles: Vec<Triangle>,
}

impl Coordinator {
    pub fn new(
        broker: Arc<dyn BrokerGateway>,
        tracker: Arc<IndividualOrderTracker>,
        detector: Arc<ArbitrageDetector>,
        correlation: Arc<CorrelationManager>,
        metrics: Arc<Metrics>,
        config: CoordinatorConfig,
    ) -> Self {
        let symbols: Vec<Symbol> = config.symbols.iter().filter_map(|s| Symbol::parse(s)).collect();
        let triangles = generate_triangles(&symbols);
        info!("Coordinator: generated {} triangles from {} symbols", triangles.len(), symbols.len());
        Self { broker, tracker, detector, correlation, metrics, config, triangles }
    }

    /// Bootstraps broker<->canonical symbol mapping before the tick loop
    /// starts, persisting it via [`SymbolMappingStore`] (spec §4.1/§6.3).
    /// Run once at startup; the detector/correlation manager already speak
    /// canonical symbol strings directly against the broker, so this exists
    /// purely for validation and disk persistence of the mapping.
    pub async fn bootstrap_symbol_mapping(broker: &dyn BrokerGateway, required: &[String], store: &SymbolMappingStore) -> SymbolMapper {
        let mut mapper = SymbolMapper::new();
        match broker.get_available_pairs().await {
            Ok(broker_symbols) => {
                let result = mapper.scan_and_map(&broker_symbols, required);
                let unmapped: Vec<&String> = result.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| k).collect();
                if !unmapped.is_empty() {
                    warn!("Coordinator: no broker symbol found for {:?}", unmapped);
                }
                if let Err(e) = store.save(&mapper.mapping().canonical_to_broker) {
                    warn!("Coordinator: failed to persist symbol mapping: {}", e);
                }
            }
            Err(e) => warn!("Coordinator: failed to fetch broker symbol list: {}", e),
        }
        mapper
    }

    /// Runs the tick loop until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Coordinator: shutdown signal received, stopping tick loop");
                    break;
                }
                _ = interval.tick() => {
                    let started = std::time::Instant::now();
                    self.tick().await;
                    self.metrics.coordinator_cycle_seconds.set(started.elapsed().as_secs_f64());
                }
            }
        }
    }

    /// One full coordinator tick, spec §4.6 steps 1-8.
    pub async fn tick(&self) {
        // 1. Account refresh.
        let (balance, equity, free_margin) = match self.refresh_account().await {
            Some(account) => account,
            None => {
                warn!("Coordinator: account data unavailable, skipping tick");
                return;
            }
        };

        // 2. Sizing update.
        let sizing = SizingParams::from_account(AccountState { balance, equity, free_margin });
        self.detector.update_sizing(sizing).await;
        self.metrics.account_balance_usd.set(balance.to_f64().unwrap_or(0.0));
        self.metrics.account_equity_usd.set(equity.to_f64().unwrap_or(0.0));

        let positions = self.broker.get_all_positions().await.unwrap_or_default();

        // 3. Portfolio health / rebalancing decision.
        if let Some(actions) = self.correlation.maybe_rebalance(&positions).await {
            for action in &actions {
                warn!(
                    "Coordinator: portfolio imbalance on {} - net exposure {} (severity {})",
                    action.currency, action.net_exposure, action.severity
                );
            }
        }

        // 4. Execute trading, branched by current regime.
        let regime = self.refresh_regime().await;
        self.detector.set_regime(regime).await;
        self.metrics.set_active_regime(&regime.to_string());

        let rates = self.build_rate_table().await;

        let regime_label = regime.to_string();
        match regime {
            MarketRegime::Volatile => {
                self.run_recovery_step(&positions).await;
                self.run_arbitrage_step(&rates, &regime_label).await;
            }
            MarketRegime::Trending | MarketRegime::Normal => {
                self.run_arbitrage_step(&rates, &regime_label).await;
                self.run_recovery_step(&positions).await;
            }
            MarketRegime::Ranging => {
                self.run_arbitrage_step(&rates, &regime_label).await;
            }
        }

        // 5. Group checks.
        if let Some(closure) = self.detector.check_active_group(&positions).await {
            info!("Coordinator: group {} closed ({:?})", closure.group_id, closure.reason);
            self.metrics.inc_groups_closed(&format!("{:?}", closure.reason).to_lowercase());
            for ticket in &closure.tickets {
                if let Err(e) = self.broker.close_position(ticket).await {
                    warn!("Coordinator: failed to close group leg {}: {}", ticket, e);
                }
            }
        }

        // 6. Recovery chain checks.
        let recovery_positions = self.broker.get_all_positions().await.unwrap_or_default();
        for closure in self.correlation.monitor_recoveries(&recovery_positions).await {
            info!("Coordinator: recovery {} closed ({:?})", closure.order_ref, closure.reason);
            self.metrics.inc_recoveries_closed(&format!("{:?}", closure.reason).to_lowercase());
            if let Err(e) = self.broker.close_position(&closure.hedge_ticket).await {
                warn!("Coordinator: failed to close hedge {}: {}", closure.hedge_ticket, e);
            }
        }

        // 7. Tracker sync.
        let sync_positions = self.broker.get_all_positions().await.unwrap_or_default();
        let outcome = self.tracker.sync_with_broker(&sync_positions).await;
        if outcome.orders_removed > 0 {
            self.metrics.inc_orphaned("original");
        }

        // 8. Metric aggregation.
        let snapshot = self.tracker.snapshot().await;
        self.metrics.tracked_orders.set(snapshot.total_tracked as f64);
        self.metrics.active_recoveries.set((snapshot.hedged_orders + snapshot.not_hedged_orders) as f64);
        self.metrics.active_groups.set(if self.detector.is_paused().await { 1.0 } else { 0.0 });
    }

    async fn refresh_account(&self) -> Option<(Decimal, Decimal, Decimal)> {
        let balance = self.broker.get_account_balance().await.ok().flatten()?;
        let equity = self.broker.get_account_equity().await.ok().flatten()?;
        let free_margin = self.broker.get_account_free_margin().await.ok().flatten()?;
        Some((balance, equity, free_margin))
    }

    /// Classifies the regime per configured symbol and rolls it up into a
    /// single portfolio regime via majority vote.
    async fn refresh_regime(&self) -> MarketRegime {
        let mut per_pair = Vec::with_capacity(self.config.symbols.len());
        for symbol in &self.config.symbols {
            let candles = self
                .broker
                .get_historical_data(symbol, Timeframe::H1, self.config.regime_lookback_bars)
                .await
                .unwrap_or_default();
            if candles.is_empty() {
                continue;
            }
            per_pair.push(classify_regime(&candles));
        }
        classify_portfolio_regime(&per_pair)
    }

    async fn build_rate_table(&self) -> RateTable {
        let mut rates = HashMap::new();
        for symbol in &self.config.symbols {
            if let Ok(Some(quote)) = self.broker.get_current_price(symbol).await {
                rates.insert(symbol.clone(), quote.mid());
            }
        }
        RateTable(rates)
    }

    async fn run_arbitrage_step(&self, rates: &RateTable, regime_label: &str) {
        if let Some(outcome) = self.detector.run_detection_cycle(&self.triangles, rates).await {
            info!("Coordinator: arbitrage group {} opened, {} legs filled", outcome.group_id, outcome.legs_filled);
            self.metrics.inc_opportunities("executed");
            self.metrics.inc_groups_opened(regime_label);
        }
    }

    /// Finds positions needing recovery (either role: an orphaned RECOVERY
    /// leg is itself eligible for further hedging, spec §3 GLOSSARY) whose
    /// loss, as a percent of account balance, clears `min_loss_percent`
    /// (spec §4.5's trigger, left undefined beyond the threshold name;
    /// resolved here as `|profit| / balance * 100`, recorded in
    /// `DESIGN.md`). Qualifying candidates are staged through the tracker's
    /// recovery priority queue (spec §3/§4.3) and hedged in descending
    /// `priority_score` order rather than registration order.
    async fn run_recovery_step(&self, positions: &[BrokerPosition]) {
        let balance = self.broker.get_account_balance().await.ok().flatten().unwrap_or(dec!(10_000));
        if balance <= Decimal::ZERO {
            return;
        }

        self.correlation.maintain_matrix(&self.config.symbols).await;

        let needing = self.tracker.orders_needing_recovery().await;
        let mut staged: HashMap<String, (BrokerPosition, crate::domain::correlation::HedgeCandidate)> = HashMap::new();
        for order in needing {
            let Some(pos) = positions.iter().find(|p| p.ticket == order.ticket && p.symbol == order.symbol) else { continue };
            if pos.profit >= Decimal::ZERO {
                continue;
            }

            let loss_percent = ((-pos.profit / balance) * dec!(100)).to_f64().unwrap_or(0.0);
            if loss_percent < self.config.min_loss_percent {
                continue;
            }

            let candidates = self.correlation.find_hedge_candidates(&pos.symbol).await;
            let Some(candidate) = candidates.into_iter().next() else { continue };

            let key = order.key();
            self.tracker.add_to_priority_queue(key.clone(), candidate.priority_score, key.clone()).await;
            staged.insert(key, (pos.clone(), candidate));
        }

        while let Some(entry) = self.tracker.pop_priority().await {
            let Some((pos, candidate)) = staged.remove(&entry.data) else { continue };

            let hedge_volume = CorrelationManager::hedge_volume(pos.profit, pos.price, candidate.hedge_ratio);
            match self.correlation.execute_hedge(&pos.ticket, &pos.symbol, pos.side, &candidate, hedge_volume, candidate.recovery_potential).await {
                Ok(Some(ticket)) => {
                    info!("Coordinator: recovery hedge placed for {} -> {} ({})", pos.symbol, candidate.hedge_pair, ticket);
                    self.metrics.inc_recoveries_opened(&format!("{:?}", candidate.direction).to_lowercase());
                    self.detector.attach_recovery_to_active_group(crate::domain::order::order_key(&ticket, &candidate.hedge_pair), candidate.hedge_pair.clone(), chrono::Utc::now()).await;
                }
                Ok(None) => {}
                Err(e) => warn!("Coordinator: hedge execution failed for {}: {}", pos.symbol, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::arbitrage_detector::DetectorConfig;
    use crate::application::correlation_manager::CorrelationManagerConfig;
    use crate::infrastructure::broker::MockBrokerGateway;
    use crate::infrastructure::persistence::order_tracking_store::OrderTrackingStore;

    fn temp_tracker() -> Arc<IndividualOrderTracker> {
        let dir = std::env::temp_dir().join(format!("triarb-coord-test-{}", uuid::Uuid::new_v4()));
        let store = OrderTrackingStore::new(dir.join("order_tracking.json"));
        Arc::new(IndividualOrderTracker::new(store, crate::application::order_tracker::DEFAULT_MAX_CHAIN_DEPTH))
    }

    fn coordinator() -> Arc<Coordinator> {
        let broker: Arc<dyn BrokerGateway> = Arc::new(MockBrokerGateway::new());
        let tracker = temp_tracker();
        let detector = Arc::new(ArbitrageDetector::new(broker.clone(), tracker.clone(), DetectorConfig::default()));
        let correlation = Arc::new(CorrelationManager::new(broker.clone(), tracker.clone(), CorrelationManagerConfig::default()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let config = CoordinatorConfig {
            tick_interval: Duration::from_secs(30),
            symbols: vec!["EURUSD".to_string(), "USDJPY".to_string(), "EURJPY".to_string()],
            min_loss_percent: 0.5,
            regime_lookback_bars: 48,
        };
        Arc::new(Coordinator::new(broker, tracker, detector, correlation, metrics, config))
    }

    #[tokio::test]
    async fn tick_completes_without_panicking_on_fresh_state() {
        let coordinator = coordinator();
        coordinator.tick().await;
        let snapshot = coordinator.tracker.snapshot().await;
        assert_eq!(snapshot.total_tracked, 0);
    }

    #[tokio::test]
    async fn tick_refreshes_account_metrics_from_mock_broker() {
        let coordinator = coordinator();
        coordinator.tick().await;
        assert!(coordinator.metrics.account_balance_usd.get() > 0.0);
    }

    #[tokio::test]
    async fn generated_triangles_are_non_empty_for_default_symbol_set() {
        let coordinator = coordinator();
        assert!(!coordinator.triangles.is_empty());
    }
}
