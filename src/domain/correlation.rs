//! Correlation matrix and hedge-candidate data model (spec §3, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse `symbol -> (symbol -> correlation)` mapping (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    entries: HashMap<String, HashMap<String, f64>>,
}

impl CorrelationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlations are symmetric; store both directions.
    pub fn set(&mut self, a: &str, b: &str, rho: f64) {
        self.entries.entry(a.to_string()).or_default().insert(b.to_string(), rho);
        self.entries.entry(b.to_string()).or_default().insert(a.to_string(), rho);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.entries.get(a).and_then(|m| m.get(b)).copied()
    }

    pub fn peers(&self, symbol: &str) -> impl Iterator<Item = (&String, &f64)> {
        self.entries.get(symbol).into_iter().flat_map(|m| m.iter())
    }

    pub fn has_any(&self, symbol: &str) -> bool {
        self.entries.get(symbol).map(|m| !m.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeDirection {
    Same,
    Opposite,
}

/// Derived, not stored (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeCandidate {
    pub hedge_pair: String,
    pub correlation: f64,
    pub hedge_ratio: f64,
    pub recovery_potential: f64,
    pub direction: HedgeDirection,
    pub priority_score: f64,
}

impl HedgeCandidate {
    pub fn direction_for(rho: f64) -> HedgeDirection {
        if rho > 0.0 { HedgeDirection::Opposite } else { HedgeDirection::Same }
    }
}

/// An active recovery record tying a base position to its hedge (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStatus {
    Active,
    Success,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub base_pair: String,
    pub hedge_pair: String,
    pub order_ref: String,
    pub ratio: f64,
    pub correlation: f64,
    pub direction: HedgeDirection,
    pub entry_time: chrono::DateTime<chrono::Utc>,
    pub potential: f64,
    pub status: RecoveryStatus,
}
