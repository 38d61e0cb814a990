//! `data/order_tracking.json` persistence (spec §6.3), grounded on
//! `trading/individual_order_tracker.py`'s `_save_to_file`/`_load_from_file`.

use crate::domain::order::TrackedOrder;
use crate::infrastructure::persistence::atomic_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Running counters surfaced by the tracker's `get_statistics()` equivalent,
/// persisted alongside the order map so a restart doesn't lose history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    pub originals_registered: u64,
    pub recoveries_registered: u64,
    pub hedged_count: u64,
    pub orphaned_count: u64,
    pub removed_count: u64,
    pub sync_operations: u64,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderTrackingSnapshot {
    order_tracking: HashMap<String, TrackedOrder>,
    stats: TrackerStats,
    saved_at: DateTime<Utc>,
}

pub struct OrderTrackingStore {
    path: PathBuf,
}

impl OrderTrackingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        Path::new("data/order_tracking.json").to_path_buf()
    }

    /// Returns `None` on a missing or malformed file, logging either way
    /// (spec §7: persistence failures are logged and the engine starts
    /// fresh rather than refusing to boot).
    pub fn load(&self) -> Option<(HashMap<String, TrackedOrder>, TrackerStats)> {
        if !self.path.exists() {
            info!("OrderTrackingStore: no existing tracking file, starting fresh");
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<OrderTrackingSnapshot>(&content) {
                Ok(snapshot) => {
                    info!("OrderTrackingStore: loaded {} tracked orders", snapshot.order_tracking.len());
                    Some((snapshot.order_tracking, snapshot.stats))
                }
                Err(e) => {
                    error!("OrderTrackingStore: malformed tracking file, starting fresh: {}", e);
                    None
                }
            },
            Err(e) => {
                error!("OrderTrackingStore: failed to read tracking file: {}", e);
                None
            }
        }
    }

    pub fn save(&self, orders: &HashMap<String, TrackedOrder>, stats: &TrackerStats) -> Result<()> {
        let snapshot = OrderTrackingSnapshot {
            order_tracking: orders.clone(),
            stats: stats.clone(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&snapshot).context("failed to serialize order tracking snapshot")?;
        atomic_write(&self.path, &content)?;
        debug!("OrderTrackingStore: saved {} tracked orders", orders.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::TrackedOrder;

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("triarb-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn round_trip_persists_orders_and_stats() {
        let store = OrderTrackingStore::new(tempdir().join("order_tracking.json"));
        let now = Utc::now();
        let mut orders = HashMap::new();
        let order = TrackedOrder::new_original("1001".into(), "EURUSD".into(), "G1".into(), now);
        orders.insert(order.key(), order);

        let mut stats = TrackerStats::default();
        stats.originals_registered = 1;
        stats.last_sync = Some(now);

        store.save(&orders, &stats).unwrap();
        let (loaded_orders, loaded_stats) = store.load().unwrap();

        assert_eq!(loaded_orders.len(), 1);
        assert!(loaded_orders.contains_key("1001_EURUSD"));
        assert_eq!(loaded_stats.originals_registered, 1);
        assert!(loaded_stats.last_sync.is_some());
    }

    #[test]
    fn missing_file_returns_none() {
        let store = OrderTrackingStore::new(tempdir().join("missing.json"));
        assert!(store.load().is_none());
    }
}
