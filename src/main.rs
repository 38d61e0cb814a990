//! Engine entry point: load configuration, wire the four subsystems
//! against the mock broker gateway, and run the Adaptive Coordinator's
//! tick loop until Ctrl+C, grounded on the teacher's `Application::build`/
//! `start` wiring sequence minus the GUI/channel-writer layer this engine
//! has no counterpart for.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use triarb::application::arbitrage_detector::{ArbitrageDetector, DetectorConfig};
use triarb::application::coordinator::{Coordinator, CoordinatorConfig};
use triarb::application::correlation_manager::{CorrelationManager, CorrelationManagerConfig};
use triarb::application::order_tracker::IndividualOrderTracker;
use triarb::config::EngineConfig;
use triarb::domain::ports::BrokerGateway;
use triarb::infrastructure::broker::MockBrokerGateway;
use triarb::infrastructure::observability::Metrics;
use triarb::infrastructure::persistence::order_tracking_store::OrderTrackingStore;
use triarb::infrastructure::persistence::symbol_mapping_store::SymbolMappingStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting engine...");

    let config = EngineConfig::from_env()?;

    let broker: Arc<dyn BrokerGateway> = Arc::new(MockBrokerGateway::new());

    let mapping_store = SymbolMappingStore::new(SymbolMappingStore::default_path());
    Coordinator::bootstrap_symbol_mapping(broker.as_ref(), &config.symbols, &mapping_store).await;

    let tracker = Arc::new(IndividualOrderTracker::new(
        OrderTrackingStore::new(OrderTrackingStore::default_path()),
        config.recovery_params.max_chain_depth,
    ));

    let detector_config = DetectorConfig {
        max_spread_ratio: config.arbitrage_params.max_spread_ratio,
        min_volume_threshold: config.arbitrage_params.min_volume_threshold,
        min_confidence: config.arbitrage_params.min_confidence,
        min_order_interval_secs: config.arbitrage_params.min_order_interval_secs,
        daily_order_cap: config.arbitrage_params.daily_order_cap,
        commission_rate: config.arbitrage_params.commission_rate,
        slippage_pct: config.arbitrage_params.slippage_pct,
        use_risk_based_sizing: config.position_sizing.use_risk_based_sizing,
        risk_per_trade_percent: config.position_sizing.risk_per_trade_percent,
        stop_loss_pips: config.arbitrage_params.stop_loss_pips,
    };
    let detector = Arc::new(ArbitrageDetector::new(broker.clone(), tracker.clone(), detector_config));

    let correlation_config = CorrelationManagerConfig {
        min_corr: config.recovery_params.min_corr,
        max_corr: config.recovery_params.max_corr,
        lookback_bars: config.recovery_params.lookback_bars,
        max_recovery_time_hours: config.recovery_params.max_recovery_time_hours,
        rebalancing_frequency_hours: config.recovery_params.rebalancing_frequency_hours,
        portfolio_balance_threshold: config.recovery_params.portfolio_balance_threshold,
        recovery_confidence_threshold: config.recovery_params.recovery_confidence_threshold,
    };
    let correlation = Arc::new(CorrelationManager::new(broker.clone(), tracker.clone(), correlation_config));

    let metrics = Arc::new(Metrics::new()?);

    let coordinator_config = CoordinatorConfig {
        tick_interval: Duration::from_secs(config.coordinator_tick_secs),
        symbols: config.symbols.clone(),
        min_loss_percent: config.recovery_params.min_loss_percent,
        regime_lookback_bars: 48,
    };
    let coordinator = Arc::new(Coordinator::new(broker, tracker, detector, correlation, metrics.clone(), coordinator_config));

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                shutdown_cancel.cancel();
            }
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
    });

    if config.observability.enabled {
        info!("Observability enabled on metrics port {} (render via Metrics::render, no HTTP listener wired)", config.observability.port);
    }

    coordinator.run(cancel).await;

    info!("Engine stopped.");
    Ok(())
}
