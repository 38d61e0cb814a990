//! Adapters: broker facade, JSON persistence, observability.

pub mod broker;
pub mod observability;
pub mod persistence;
