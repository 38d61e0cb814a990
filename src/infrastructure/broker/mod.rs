//! A deterministic, in-memory `BrokerGateway` for tests and local runs,
//! grounded on the teacher's `MockExecutionService`/`MockMarketDataService`
//! (`infrastructure/mock.rs`): same LCG-based price walk, same
//! `RwLock<HashMap<...>>` state shape, same "fill immediately" execution
//! model minus slippage/fee accounting (spec §6.1 treats the broker as an
//! opaque facade; cost modeling lives in the detector, not here).

use crate::application::calculations::pip_value::{calculate_pip_value, RateTable};
use crate::domain::ports::{BrokerGateway, BrokerPosition, Candle, OrderRequest, OrderResult, MT5_SUCCESS_RETCODE};
use crate::domain::types::{OrderSide, Quote, Symbol, Timeframe};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

fn lcg_next(seed: u64) -> u64 {
    seed.wrapping_mul(1_103_515_245).wrapping_add(12_345)
}

/// Maps a raw LCG word to a signed fraction in `[-0.5, 0.5)`.
fn lcg_to_unit(seed: u64) -> f64 {
    (((seed / 65_536) % 1000) as f64 / 1000.0) - 0.5
}

fn default_seed_prices() -> Vec<(&'static str, Decimal, Decimal)> {
    vec![
        ("EURUSD", dec!(1.08500), dec!(1.08515)),
        ("GBPUSD", dec!(1.26500), dec!(1.26518)),
        ("USDJPY", dec!(150.500), dec!(150.515)),
        ("USDCHF", dec!(0.88500), dec!(0.88515)),
        ("AUDUSD", dec!(0.65500), dec!(0.65515)),
        ("USDCAD", dec!(1.35500), dec!(1.35515)),
        ("NZDUSD", dec!(0.60500), dec!(0.60515)),
        ("EURGBP", dec!(0.85750), dec!(0.85765)),
        ("EURJPY", dec!(163.300), dec!(163.320)),
        ("GBPJPY", dec!(190.400), dec!(190.425)),
    ]
}

pub struct MockBrokerGateway {
    prices: RwLock<HashMap<String, Quote>>,
    positions: RwLock<HashMap<String, BrokerPosition>>,
    reject_next: RwLock<HashSet<String>>,
    next_ticket: AtomicU64,
    balance: RwLock<Decimal>,
    walk_seed: AtomicU64,
}

impl MockBrokerGateway {
    pub fn new() -> Self {
        Self::with_seed_prices(&default_seed_prices())
    }

    pub fn with_seed_prices(pairs: &[(&str, Decimal, Decimal)]) -> Self {
        let mut prices = HashMap::new();
        let now = Utc::now();
        for (symbol, bid, ask) in pairs {
            prices.insert((*symbol).to_string(), Quote { bid: *bid, ask: *ask, timestamp: now });
        }
        Self {
            prices: RwLock::new(prices),
            positions: RwLock::new(HashMap::new()),
            reject_next: RwLock::new(HashSet::new()),
            next_ticket: AtomicU64::new(1),
            balance: RwLock::new(dec!(10000)),
            walk_seed: AtomicU64::new(42),
        }
    }

    pub async fn set_price(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.prices.write().await.insert(symbol.to_string(), Quote { bid, ask, timestamp: Utc::now() });
    }

    pub async fn set_balance(&self, balance: Decimal) {
        *self.balance.write().await = balance;
    }

    /// The next `place_order` call for `symbol` fails with a non-success
    /// retcode, then the injection clears (one-shot, like a broker-side
    /// requote).
    pub async fn inject_rejection(&self, symbol: &str) {
        self.reject_next.write().await.insert(symbol.to_string());
    }

    /// Advances every seeded price one LCG step, mirroring the teacher's
    /// simulated-tick walk in `MockMarketDataService::subscribe`.
    pub async fn tick(&self) {
        let seed = self.walk_seed.fetch_add(1, Ordering::Relaxed);
        let mut prices = self.prices.write().await;
        for (idx, quote) in prices.values_mut().enumerate() {
            let step = lcg_next(seed.wrapping_add(idx as u64));
            let change_pct = Decimal::from_f64_retain(lcg_to_unit(step) * 0.001).unwrap_or(Decimal::ZERO);
            let mid = quote.mid();
            let drift = mid * change_pct;
            quote.bid += drift;
            quote.ask += drift;
            quote.timestamp = Utc::now();
        }
    }

    /// Marks every open position to the live quote: `current_price` is the
    /// side the position would close at (bid for a Buy, ask for a Sell),
    /// and `profit` is the pip difference from entry priced through
    /// [`calculate_pip_value`] — the same per-lot pip value the detector
    /// uses when sizing legs. Called on every position read so downstream
    /// group-closure and recovery logic sees a live PnL, not the zero fill
    /// snapshot `place_order` records at open.
    async fn mark_to_market(&self) {
        let prices = self.prices.read().await;
        let rates = RateTable(prices.iter().map(|(s, q)| (s.clone(), q.mid())).collect());
        let mut positions = self.positions.write().await;
        for position in positions.values_mut() {
            let Some(quote) = prices.get(&position.symbol) else { continue };
            let Some(symbol) = Symbol::parse(&position.symbol) else { continue };

            let (current_price, diff_pips) = match position.side {
                OrderSide::Buy => (quote.bid, (quote.bid - position.price) / symbol.pip_size()),
                OrderSide::Sell => (quote.ask, (position.price - quote.ask) / symbol.pip_size()),
            };
            position.current_price = current_price;
            position.profit = diff_pips * calculate_pip_value(&symbol, position.volume, &rates);
        }
    }
}

impl Default for MockBrokerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerGateway for MockBrokerGateway {
    async fn connect(&self) -> Result<bool> {
        Ok(true)
    }

    async fn get_available_pairs(&self) -> Result<Vec<String>> {
        Ok(self.prices.read().await.keys().cloned().collect())
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(self.prices.read().await.get(symbol).copied())
    }

    async fn get_spread_pips(&self, symbol: &str) -> Result<Option<Decimal>> {
        let prices = self.prices.read().await;
        let Some(quote) = prices.get(symbol) else { return Ok(None) };
        let Some(parsed) = crate::domain::types::Symbol::parse(symbol) else { return Ok(None) };
        Ok(Some(quote.spread_pips(&parsed)))
    }

    async fn get_historical_data(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>> {
        let Some(current) = self.prices.read().await.get(symbol).copied() else { return Ok(Vec::new()) };
        let bar_span = match timeframe {
            Timeframe::M1 => chrono::Duration::minutes(1),
            Timeframe::M5 => chrono::Duration::minutes(5),
            Timeframe::M15 => chrono::Duration::minutes(15),
            Timeframe::M30 => chrono::Duration::minutes(30),
            Timeframe::H1 => chrono::Duration::hours(1),
            Timeframe::H4 => chrono::Duration::hours(4),
            Timeframe::D1 => chrono::Duration::days(1),
        };

        let mut candles = Vec::with_capacity(count);
        let mut close = current.mid();
        let mut seed = symbol.bytes().fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let now = Utc::now();

        for i in (0..count).rev() {
            seed = lcg_next(seed);
            let change_pct = Decimal::from_f64_retain(lcg_to_unit(seed) * 0.002).unwrap_or(Decimal::ZERO);
            let open = close / (Decimal::ONE + change_pct).max(dec!(0.0001));
            let high = open.max(close) * dec!(1.0005);
            let low = open.min(close) * dec!(0.9995);
            candles.push(Candle { time: now - bar_span * (i as i32 + 1), open, high, low, close });
            close = open;
        }
        candles.reverse();
        Ok(candles)
    }

    async fn get_account_balance(&self) -> Result<Option<Decimal>> {
        Ok(Some(*self.balance.read().await))
    }

    async fn get_account_equity(&self) -> Result<Option<Decimal>> {
        let balance = *self.balance.read().await;
        let floating: Decimal = self.positions.read().await.values().map(|p| p.profit).sum();
        Ok(Some(balance + floating))
    }

    async fn get_account_free_margin(&self) -> Result<Option<Decimal>> {
        self.get_account_equity().await
    }

    async fn get_all_positions(&self) -> Result<Vec<BrokerPosition>> {
        self.mark_to_market().await;
        Ok(self.positions.read().await.values().cloned().collect())
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult> {
        if self.reject_next.write().await.remove(&request.symbol) {
            return Ok(OrderResult { success: false, ticket: None, retcode: 10004, error_msg: Some("requote".to_string()) });
        }

        let Some(quote) = self.prices.read().await.get(&request.symbol).copied() else {
            return Ok(OrderResult { success: false, ticket: None, retcode: 10014, error_msg: Some("invalid volume/symbol".to_string()) });
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed).to_string();
        let fill_price = match request.side {
            OrderSide::Buy => quote.ask,
            OrderSide::Sell => quote.bid,
        };

        let position = BrokerPosition {
            ticket: ticket.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            volume: request.volume,
            price: fill_price,
            current_price: fill_price,
            profit: Decimal::ZERO,
            swap: Decimal::ZERO,
            time: Utc::now(),
            magic: request.magic,
            comment: request.comment,
        };
        self.positions.write().await.insert(ticket.clone(), position);

        Ok(OrderResult { success: true, ticket: Some(ticket), retcode: MT5_SUCCESS_RETCODE, error_msg: None })
    }

    async fn close_position(&self, ticket: &str) -> Result<bool> {
        Ok(self.positions.write().await.remove(ticket).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn place_order_fills_at_current_quote_and_tracks_position() {
        let broker = MockBrokerGateway::new();
        let result = broker
            .place_order(OrderRequest { symbol: "EURUSD".to_string(), side: OrderSide::Buy, volume: dec!(0.1), comment: "test".to_string(), magic: 1 })
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.retcode, MT5_SUCCESS_RETCODE);
        let positions = broker.get_all_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
    }

    #[tokio::test]
    async fn injected_rejection_fails_exactly_once() {
        let broker = MockBrokerGateway::new();
        broker.inject_rejection("EURUSD").await;

        let first = broker
            .place_order(OrderRequest { symbol: "EURUSD".to_string(), side: OrderSide::Buy, volume: dec!(0.1), comment: "test".to_string(), magic: 1 })
            .await
            .unwrap();
        assert!(!first.success);

        let second = broker
            .place_order(OrderRequest { symbol: "EURUSD".to_string(), side: OrderSide::Buy, volume: dec!(0.1), comment: "test".to_string(), magic: 1 })
            .await
            .unwrap();
        assert!(second.success);
    }

    #[tokio::test]
    async fn get_all_positions_marks_to_market_on_read() {
        let broker = MockBrokerGateway::new();
        let result = broker
            .place_order(OrderRequest { symbol: "EURUSD".to_string(), side: OrderSide::Buy, volume: dec!(1.0), comment: "test".to_string(), magic: 1 })
            .await
            .unwrap();
        let ticket = result.ticket.unwrap();

        let opened = broker.get_all_positions().await.unwrap();
        assert_eq!(opened[0].profit, Decimal::ZERO);

        broker.set_price("EURUSD", dec!(1.09000), dec!(1.09015)).await;
        let repriced = broker.get_all_positions().await.unwrap();
        let position = repriced.iter().find(|p| p.ticket == ticket).unwrap();
        assert!(position.profit > Decimal::ZERO);
        assert_eq!(position.current_price, dec!(1.09000));
    }

    #[tokio::test]
    async fn close_position_removes_tracked_ticket() {
        let broker = MockBrokerGateway::new();
        let result = broker
            .place_order(OrderRequest { symbol: "EURUSD".to_string(), side: OrderSide::Buy, volume: dec!(0.1), comment: "test".to_string(), magic: 1 })
            .await
            .unwrap();
        let ticket = result.ticket.unwrap();
        assert!(broker.close_position(&ticket).await.unwrap());
        assert!(broker.get_all_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn historical_data_returns_requested_bar_count() {
        let broker = MockBrokerGateway::new();
        let candles = broker.get_historical_data("EURUSD", Timeframe::H1, 50).await.unwrap();
        assert_eq!(candles.len(), 50);
    }
}
