//! Per-subsystem error taxonomy.
//!
//! Mirrors the teacher's `domain::errors` split: each subsystem owns a
//! `thiserror` enum describing exactly the failure kinds it can produce.
//! Per spec §7, none of these escape the public API of the tracker,
//! detector, or correlation manager — callers get booleans/options back
//! and the error is logged at the call site. They exist so that logging
//! can be specific about *why* an operation was refused.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from the Individual Order Tracker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("order key already registered: {0}")]
    KeyExists(String),

    #[error("parent order not found for recovery registration: {0}")]
    ParentNotFound(String),

    #[error("recovery chain depth {depth} would exceed max_chain_depth {max}")]
    ChainDepthExceeded { depth: usize, max: usize },

    #[error("order not found: {0}")]
    NotFound(String),
}

/// Errors from the Arbitrage Detector's group-execution gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("an active group already exists: {0}")]
    GroupActive(String),

    #[error("symbol {symbol} already used by active group {group_id}")]
    SymbolInUse { symbol: String, group_id: String },

    #[error("rate limited: {seconds_remaining}s until next order is permitted")]
    RateLimited { seconds_remaining: i64 },

    #[error("daily order cap reached: {count}/{cap}")]
    DailyCapReached { count: u32, cap: u32 },

    #[error("triangle is invalid: {0}")]
    InvalidTriangle(String),
}

/// Classification of a broker return code, per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerErrorKind {
    Transient,
    Permanent,
    Success,
}

/// Errors surfaced by the broker gateway facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("broker error {code}: {message}")]
pub struct BrokerError {
    pub code: u32,
    pub message: String,
}

impl BrokerError {
    pub fn kind(&self) -> BrokerErrorKind {
        classify_retcode(self.code)
    }
}

/// Classify an MT5-style return code into transient/permanent/success,
/// per the table in spec §7.
pub fn classify_retcode(code: u32) -> BrokerErrorKind {
    match code {
        10009 => BrokerErrorKind::Success,
        10046 | 10047 | 10048 | 10049 | 10052 => BrokerErrorKind::Transient,
        10004 | 10027 | 10014 | 10064 => BrokerErrorKind::Permanent,
        _ => BrokerErrorKind::Permanent,
    }
}

/// Errors from correlation-based recovery sizing, used internally for
/// input validation; pure calculation functions return `0`/`None` on
/// these conditions rather than propagating them, per spec §4.2/§4.5.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalculationError {
    #[error("price out of valid range [0.0001, 1000]: {0}")]
    PriceOutOfRange(Decimal),

    #[error("insufficient aligned history: {len} bars (need >= 10)")]
    InsufficientHistory { len: usize },

    #[error("zero variance series")]
    ZeroVariance,
}
