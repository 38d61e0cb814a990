//! FX triangular-arbitrage and correlation-recovery trading engine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
