//! Prometheus metrics, grounded on `infrastructure/observability/metrics.rs`:
//! same `prometheus` crate, same `arbfx_`-prefixed registry pattern.

use prometheus::{
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
    CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub account_equity_usd: GenericGauge<AtomicF64>,
    pub account_balance_usd: GenericGauge<AtomicF64>,
    pub active_groups: GenericGauge<AtomicF64>,
    pub active_recoveries: GenericGauge<AtomicF64>,
    pub tracked_orders: GenericGauge<AtomicF64>,
    pub orphaned_orders_total: CounterVec,
    pub opportunities_detected_total: CounterVec,
    pub groups_opened_total: CounterVec,
    pub groups_closed_total: CounterVec,
    pub recoveries_opened_total: CounterVec,
    pub recoveries_closed_total: CounterVec,
    pub market_regime: GenericGaugeVec<AtomicF64>,
    pub coordinator_cycle_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let account_equity_usd = Gauge::with_opts(Opts::new("arbfx_account_equity_usd", "Account equity in USD"))?;
        registry.register(Box::new(account_equity_usd.clone()))?;

        let account_balance_usd = Gauge::with_opts(Opts::new("arbfx_account_balance_usd", "Account balance in USD"))?;
        registry.register(Box::new(account_balance_usd.clone()))?;

        let active_groups = Gauge::with_opts(Opts::new("arbfx_active_groups", "Number of open arbitrage groups"))?;
        registry.register(Box::new(active_groups.clone()))?;

        let active_recoveries = Gauge::with_opts(Opts::new("arbfx_active_recoveries", "Number of open correlation hedges"))?;
        registry.register(Box::new(active_recoveries.clone()))?;

        let tracked_orders = Gauge::with_opts(Opts::new("arbfx_tracked_orders", "Orders tracked by the individual order tracker"))?;
        registry.register(Box::new(tracked_orders.clone()))?;

        let orphaned_orders_total = CounterVec::new(Opts::new("arbfx_orphaned_orders_total", "Orders orphaned on broker-side close"), &["role"])?;
        registry.register(Box::new(orphaned_orders_total.clone()))?;

        let opportunities_detected_total =
            CounterVec::new(Opts::new("arbfx_opportunities_detected_total", "Arbitrage opportunities found by the detector"), &["outcome"])?;
        registry.register(Box::new(opportunities_detected_total.clone()))?;

        let groups_opened_total = CounterVec::new(Opts::new("arbfx_groups_opened_total", "Arbitrage groups fully entered"), &["regime"])?;
        registry.register(Box::new(groups_opened_total.clone()))?;

        let groups_closed_total = CounterVec::new(Opts::new("arbfx_groups_closed_total", "Arbitrage groups closed"), &["reason"])?;
        registry.register(Box::new(groups_closed_total.clone()))?;

        let recoveries_opened_total = CounterVec::new(Opts::new("arbfx_recoveries_opened_total", "Correlation hedges placed"), &["direction"])?;
        registry.register(Box::new(recoveries_opened_total.clone()))?;

        let recoveries_closed_total = CounterVec::new(Opts::new("arbfx_recoveries_closed_total", "Correlation hedges closed"), &["reason"])?;
        registry.register(Box::new(recoveries_closed_total.clone()))?;

        let market_regime = GaugeVec::new(Opts::new("arbfx_market_regime", "1 if this regime is currently active"), &["regime"])?;
        registry.register(Box::new(market_regime.clone()))?;

        let coordinator_cycle_seconds = Gauge::with_opts(Opts::new("arbfx_coordinator_cycle_seconds", "Duration of the last coordinator tick"))?;
        registry.register(Box::new(coordinator_cycle_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            account_equity_usd,
            account_balance_usd,
            active_groups,
            active_recoveries,
            tracked_orders,
            orphaned_orders_total,
            opportunities_detected_total,
            groups_opened_total,
            groups_closed_total,
            recoveries_opened_total,
            recoveries_closed_total,
            market_regime,
            coordinator_cycle_seconds,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn set_active_regime(&self, regime: &str) {
        for r in ["ranging", "trending", "volatile", "normal"] {
            self.market_regime.with_label_values(&[r]).set(if r == regime { 1.0 } else { 0.0 });
        }
    }

    pub fn inc_orphaned(&self, role: &str) {
        self.orphaned_orders_total.with_label_values(&[role]).inc();
    }

    pub fn inc_opportunities(&self, outcome: &str) {
        self.opportunities_detected_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_groups_opened(&self, regime: &str) {
        self.groups_opened_total.with_label_values(&[regime]).inc();
    }

    pub fn inc_groups_closed(&self, reason: &str) {
        self.groups_closed_total.with_label_values(&[reason]).inc();
    }

    pub fn inc_recoveries_opened(&self, direction: &str) {
        self.recoveries_opened_total.with_label_values(&[direction]).inc();
    }

    pub fn inc_recoveries_closed(&self, reason: &str) {
        self.recoveries_closed_total.with_label_values(&[reason]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to construct Metrics registry")
    }
}
