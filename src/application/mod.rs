//! Use-case layer: the four stateful subsystems (spec §2) plus the pure
//! calculation library they all depend on.

pub mod arbitrage_detector;
pub mod calculations;
pub mod coordinator;
pub mod correlation_manager;
pub mod order_tracker;
pub mod symbol_mapper;
