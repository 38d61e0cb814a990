//! The Broker Gateway facade (spec §6.1).
//!
//! Out of scope per spec §1: treated as an opaque synchronous-in-spirit
//! facade. Modeled the way this codebase models `MarketDataService`/
//! `ExecutionService` — a single `async_trait`, since spec.md describes
//! it as one collaborator, not two.

use crate::domain::types::{OrderSide, Quote, Timeframe};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Success sentinel for `place_order`/`close_position` (spec §6.1).
pub const MT5_SUCCESS_RETCODE: u32 = 10009;

#[derive(Debug, Clone)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub ticket: String,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: Decimal,
    pub price: Decimal,
    pub current_price: Decimal,
    pub profit: Decimal,
    pub swap: Decimal,
    pub time: DateTime<Utc>,
    pub magic: u64,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: Decimal,
    pub comment: String,
    pub magic: u64,
}

#[derive(Debug, Clone)]
pub struct OrderResult {
    pub success: bool,
    pub ticket: Option<String>,
    pub retcode: u32,
    pub error_msg: Option<String>,
}

#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn connect(&self) -> Result<bool>;
    async fn get_available_pairs(&self) -> Result<Vec<String>>;
    async fn get_current_price(&self, symbol: &str) -> Result<Option<Quote>>;
    async fn get_spread_pips(&self, symbol: &str) -> Result<Option<Decimal>>;
    async fn get_historical_data(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;
    async fn get_account_balance(&self) -> Result<Option<Decimal>>;
    async fn get_account_equity(&self) -> Result<Option<Decimal>>;
    async fn get_account_free_margin(&self) -> Result<Option<Decimal>>;
    async fn get_all_positions(&self) -> Result<Vec<BrokerPosition>>;
    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult>;
    async fn close_position(&self, ticket: &str) -> Result<bool>;
}
