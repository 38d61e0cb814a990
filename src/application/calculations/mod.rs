//! Pure, deterministic trading calculations (spec §4.2).
//!
//! Grounded on `utils/calculations.py`. Every function here is
//! side-effect-free: given the same inputs it always returns the same
//! output, and invalid input yields a zero/`None` result rather than an
//! error, matching the teacher's validator-then-compute shape (see
//! `domain::risk::filters::correlation_filter`).

pub mod arbitrage_cost;
pub mod correlation_stats;
pub mod pip_value;
pub mod regime_classifier;
pub mod sizing;

pub use arbitrage_cost::*;
pub use correlation_stats::*;
pub use pip_value::*;
pub use regime_classifier::*;
pub use sizing::*;
