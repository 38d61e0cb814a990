//! Individual Order Tracker (spec §4.3), grounded on
//! `trading/individual_order_tracker.py`.
//!
//! One `tokio::sync::Mutex` guards the order map, priority queue, and stats
//! together so a caller never observes a half-updated chain. Broker I/O is
//! done by the caller and the resulting positions passed into
//! [`IndividualOrderTracker::sync_with_broker`] — the lock is only ever
//! held across in-memory mutation, never across an await on the network.

use crate::domain::errors::TrackerError;
use crate::domain::order::{order_key, OrderRole, OrderStatus, TrackedOrder};
use crate::domain::ports::BrokerPosition;
use crate::domain::priority_queue::{PriorityEntry, RecoveryPriorityQueue};
use crate::infrastructure::persistence::order_tracking_store::{OrderTrackingStore, TrackerStats};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 3;

struct TrackerState {
    orders: HashMap<String, TrackedOrder>,
    queue: RecoveryPriorityQueue<String>,
    stats: TrackerStats,
}

pub struct IndividualOrderTracker {
    state: Mutex<TrackerState>,
    store: OrderTrackingStore,
    max_chain_depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub orders_checked: usize,
    pub orders_removed: usize,
    pub orders_auto_registered: usize,
}

#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub total_tracked: usize,
    pub original_orders: usize,
    pub recovery_orders: usize,
    pub hedged_orders: usize,
    pub not_hedged_orders: usize,
    pub orphaned_orders: usize,
    pub priority_queue_size: usize,
    pub cumulative: TrackerStats,
}

impl IndividualOrderTracker {
    pub fn new(store: OrderTrackingStore, max_chain_depth: usize) -> Self {
        let (orders, stats) = store.load().unwrap_or_else(|| (HashMap::new(), TrackerStats::default()));
        info!("IndividualOrderTracker: initialized with {} tracked orders", orders.len());
        Self {
            state: Mutex::new(TrackerState { orders, queue: RecoveryPriorityQueue::new(), stats }),
            store,
            max_chain_depth,
        }
    }

    pub async fn register_original(&self, ticket: &str, symbol: &str, group_id: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let key = order_key(ticket, symbol);
        if state.orders.contains_key(&key) {
            warn!("IndividualOrderTracker: order {} already registered", key);
            return Err(TrackerError::KeyExists(key));
        }

        let order = TrackedOrder::new_original(ticket.to_string(), symbol.to_string(), group_id.to_string(), Utc::now());
        state.orders.insert(key.clone(), order);
        state.stats.originals_registered += 1;
        info!("IndividualOrderTracker: original order registered: {}", key);
        self.persist(&state);
        Ok(())
    }

    /// Marks the original as hedged and links a new recovery order to it.
    /// Refused if the original is unknown or if one more hop would exceed
    /// `max_chain_depth` (spec §9's resolution of the chain-depth Open
    /// Question: enforced here by walking `hedging_for` ancestors).
    pub async fn register_recovery(
        &self,
        recovery_ticket: &str,
        recovery_symbol: &str,
        original_ticket: &str,
        original_symbol: &str,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let original_key = order_key(original_ticket, original_symbol);
        let recovery_key = order_key(recovery_ticket, recovery_symbol);

        if !state.orders.contains_key(&original_key) {
            error!("IndividualOrderTracker: original order {} not found for recovery", original_key);
            return Err(TrackerError::ParentNotFound(original_key));
        }

        let depth = Self::chain_depth(&state.orders, &original_key) + 1;
        if depth > self.max_chain_depth {
            warn!(
                "IndividualOrderTracker: refusing recovery for {} - depth {} exceeds max {}",
                original_key, depth, self.max_chain_depth
            );
            return Err(TrackerError::ChainDepthExceeded { depth, max: self.max_chain_depth });
        }

        let group_id = state.orders.get(&original_key).map(|o| o.group_id.clone()).unwrap_or_default();

        if let Some(original) = state.orders.get_mut(&original_key) {
            original.status = OrderStatus::Hedged;
            original.recovery_orders.push(recovery_key.clone());
        }

        let recovery = TrackedOrder::new_recovery(
            recovery_ticket.to_string(),
            recovery_symbol.to_string(),
            group_id,
            original_key.clone(),
            Utc::now(),
        );
        state.orders.insert(recovery_key.clone(), recovery);
        state.stats.recoveries_registered += 1;
        state.stats.hedged_count += 1;
        info!("IndividualOrderTracker: recovery registered {} -> {}", original_key, recovery_key);
        self.persist(&state);
        Ok(())
    }

    /// Number of hedge levels already above `key` in its chain, i.e. how
    /// many times `hedging_for` can be followed before reaching an order
    /// with no parent.
    fn chain_depth(orders: &HashMap<String, TrackedOrder>, key: &str) -> usize {
        let mut depth = 0;
        let mut current = key.to_string();
        while let Some(parent) = orders.get(&current).and_then(|o| o.hedging_for.clone()) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub async fn is_hedged(&self, ticket: &str, symbol: &str) -> bool {
        let state = self.state.lock().await;
        state.orders.get(&order_key(ticket, symbol)).map(|o| o.is_hedged()).unwrap_or(false)
    }

    pub async fn needs_recovery(&self, ticket: &str, symbol: &str) -> bool {
        let state = self.state.lock().await;
        state.orders.get(&order_key(ticket, symbol)).map(|o| o.needs_recovery()).unwrap_or(false)
    }

    pub async fn is_tracked(&self, ticket: &str, symbol: &str) -> bool {
        let state = self.state.lock().await;
        state.orders.contains_key(&order_key(ticket, symbol))
    }

    pub async fn get(&self, ticket: &str, symbol: &str) -> Option<TrackedOrder> {
        let state = self.state.lock().await;
        state.orders.get(&order_key(ticket, symbol)).cloned()
    }

    pub async fn orders_needing_recovery(&self) -> Vec<TrackedOrder> {
        let state = self.state.lock().await;
        state.orders.values().filter(|o| o.needs_recovery()).cloned().collect()
    }

    pub async fn add_to_priority_queue(&self, order_key: String, priority_score: f64, data: String) {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.queue.add(order_key, priority_score, data, now);
    }

    pub async fn pop_priority(&self) -> Option<PriorityEntry<String>> {
        let mut state = self.state.lock().await;
        state.queue.pop()
    }

    /// Reconciles tracked state against the broker's current open
    /// positions: auto-registers untracked positions (classifying
    /// ORIGINAL/RECOVERY from the order comment) and removes tickets that
    /// are no longer open, orphaning recovery legs whose original just
    /// closed and un-hedging originals whose recovery leg closed.
    pub async fn sync_with_broker(&self, positions: &[BrokerPosition]) -> SyncOutcome {
        let mut state = self.state.lock().await;
        let mut outcome = SyncOutcome::default();

        if positions.is_empty() {
            warn!("IndividualOrderTracker: no positions returned from broker during sync");
            state.stats.sync_operations += 1;
            state.stats.last_sync = Some(Utc::now());
            return outcome;
        }

        let active_tickets: HashSet<&str> = positions.iter().map(|p| p.ticket.as_str()).collect();

        for pos in positions {
            let key = order_key(&pos.ticket, &pos.symbol);
            if state.orders.contains_key(&key) {
                continue;
            }

            let is_recovery = is_recovery_comment(&pos.comment);
            let group_id = extract_group_from_comment(&pos.comment, &pos.symbol);
            let now = Utc::now();

            let mut order = if is_recovery {
                TrackedOrder::new_recovery(pos.ticket.clone(), pos.symbol.clone(), group_id.clone(), String::new(), now)
            } else {
                TrackedOrder::new_original(pos.ticket.clone(), pos.symbol.clone(), group_id.clone(), now)
            };
            order.auto_registered = true;
            order.comment = pos.comment.clone();

            if is_recovery {
                match find_original_order_for_recovery(&state.orders, &pos.comment, &group_id) {
                    Some(original_key) => {
                        order.hedging_for = Some(original_key.clone());
                        order.status = OrderStatus::Hedged;
                        if let Some(original) = state.orders.get_mut(&original_key) {
                            if !original.recovery_orders.contains(&key) {
                                original.recovery_orders.push(key.clone());
                            }
                            original.status = OrderStatus::Hedged;
                        }
                    }
                    None => order.status = OrderStatus::Orphaned,
                }
                state.stats.recoveries_registered += 1;
                info!("IndividualOrderTracker: auto-registered recovery position {} in {}", key, group_id);
            } else {
                state.stats.originals_registered += 1;
                info!("IndividualOrderTracker: auto-registered original position {} in {}", key, group_id);
            }

            state.orders.insert(key, order);
            outcome.orders_auto_registered += 1;
        }

        let keys: Vec<String> = state.orders.keys().cloned().collect();
        let mut to_remove = Vec::new();

        for key in &keys {
            outcome.orders_checked += 1;
            let Some(tracked) = state.orders.get(key) else { continue };
            if active_tickets.contains(tracked.ticket.as_str()) {
                continue;
            }

            let role = tracked.role;
            let status = tracked.status;

            if role == OrderRole::Original && status == OrderStatus::Hedged {
                let recovery_keys = tracked.recovery_orders.clone();
                let active_recoveries: Vec<String> = recovery_keys
                    .into_iter()
                    .filter(|rk| {
                        state.orders.get(rk).map(|r| active_tickets.contains(r.ticket.as_str())).unwrap_or(false)
                    })
                    .collect();
                if !active_recoveries.is_empty() {
                    warn!(
                        "IndividualOrderTracker: {} recovery orders orphaned by closed original {}",
                        active_recoveries.len(),
                        key
                    );
                    for rk in &active_recoveries {
                        if let Some(r) = state.orders.get_mut(rk) {
                            r.status = OrderStatus::Orphaned;
                        }
                    }
                }
            } else if role == OrderRole::Recovery {
                if let Some(parent_key) = tracked.hedging_for.clone() {
                    let parent_still_active =
                        state.orders.get(&parent_key).map(|p| active_tickets.contains(p.ticket.as_str())).unwrap_or(false);
                    if parent_still_active {
                        if let Some(parent) = state.orders.get_mut(&parent_key) {
                            parent.status = OrderStatus::NotHedged;
                        }
                        warn!(
                            "IndividualOrderTracker: original {} marked NOT_HEDGED (recovery {} closed)",
                            parent_key, key
                        );
                    }
                }
            }

            to_remove.push(key.clone());
        }

        for key in &to_remove {
            state.orders.remove(key);
        }
        outcome.orders_removed = to_remove.len();

        state.stats.sync_operations += 1;
        state.stats.removed_count += outcome.orders_removed as u64;
        state.stats.last_sync = Some(Utc::now());

        if outcome.orders_removed > 0 || outcome.orders_auto_registered > 0 {
            info!(
                "IndividualOrderTracker: sync complete - checked {}, removed {}, auto-registered {}",
                outcome.orders_checked, outcome.orders_removed, outcome.orders_auto_registered
            );
            self.persist(&state);
        }

        outcome
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        let state = self.state.lock().await;
        TrackerSnapshot {
            total_tracked: state.orders.len(),
            original_orders: state.orders.values().filter(|o| o.role == OrderRole::Original).count(),
            recovery_orders: state.orders.values().filter(|o| o.role == OrderRole::Recovery).count(),
            hedged_orders: state
                .orders
                .values()
                .filter(|o| o.role == OrderRole::Original && o.status == OrderStatus::Hedged)
                .count(),
            not_hedged_orders: state
                .orders
                .values()
                .filter(|o| o.role == OrderRole::Original && o.status == OrderStatus::NotHedged)
                .count(),
            orphaned_orders: state.orders.values().filter(|o| o.status == OrderStatus::Orphaned).count(),
            priority_queue_size: state.queue.len(),
            cumulative: state.stats.clone(),
        }
    }

    fn persist(&self, state: &TrackerState) {
        if let Err(e) = self.store.save(&state.orders, &state.stats) {
            error!("IndividualOrderTracker: failed to persist tracking state: {}", e);
        }
    }
}

fn is_recovery_comment(comment: &str) -> bool {
    if comment.is_empty() {
        return false;
    }
    comment.starts_with("RECOVERY_") || comment.starts_with('R') || comment.to_uppercase().contains("RECOVERY")
}

/// Fallback grouping when the comment carries no group marker. Mirrors the
/// final (last-write-wins) values of the original's duplicate-keyed lookup
/// table, not a redesign.
fn extract_group_from_comment(comment: &str, symbol: &str) -> String {
    if !comment.is_empty() {
        if let Some(rest) = comment.strip_prefix('G') {
            let part = rest.split('_').next().unwrap_or("");
            if part.parse::<u32>().is_ok() {
                return format!("G{part}");
            }
        }
        if comment.contains("group_") {
            let parts: Vec<&str> = comment.split('_').collect();
            if parts.len() >= 3 {
                return format!("G{}", parts[2]);
            }
        }
    }

    let clean = symbol.replace(".v", "").replace(".m", "").replace('p', "").replace('a', "");
    match clean.as_str() {
        "GBPUSD" => "G3",
        "EURGBP" => "G1",
        "EURUSD" => "G2",
        "USDCHF" => "G5",
        "EURCHF" => "G2",
        "USDJPY" => "G3",
        "GBPJPY" => "G3",
        "AUDUSD" => "G6",
        "USDCAD" => "G4",
        "AUDCAD" => "G4",
        "NZDUSD" => "G6",
        "NZDCHF" => "G5",
        "AUDNZD" => "G6",
        _ => "G1",
    }
    .to_string()
}

fn find_original_order_for_recovery(
    orders: &HashMap<String, TrackedOrder>,
    comment: &str,
    group_id: &str,
) -> Option<String> {
    if comment.is_empty() {
        return None;
    }

    if comment.starts_with('R') && comment.contains('_') && !comment.starts_with("RECOVERY_") {
        let ticket_part = comment[1..].split('_').next().unwrap_or("");
        return orders
            .iter()
            .find(|(_, o)| o.role == OrderRole::Original && o.ticket.ends_with(ticket_part))
            .map(|(key, _)| key.clone());
    }

    if let Some(rest) = comment.strip_prefix("RECOVERY_") {
        let parts: Vec<&str> = rest.split('_').collect();
        if parts.len() >= 2 {
            let original_symbol = parts[1].replace("TO", "").replace("L1", "").replace("L2", "");
            return orders
                .iter()
                .find(|(_, o)| o.role == OrderRole::Original && o.group_id == group_id && o.symbol == original_symbol)
                .map(|(key, _)| key.clone());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderSide;

    fn tracker() -> IndividualOrderTracker {
        let dir = std::env::temp_dir().join(format!("triarb-test-{}", uuid::Uuid::new_v4()));
        let store = OrderTrackingStore::new(dir.join("order_tracking.json"));
        IndividualOrderTracker::new(store, DEFAULT_MAX_CHAIN_DEPTH)
    }

    fn position(ticket: &str, symbol: &str, comment: &str) -> BrokerPosition {
        BrokerPosition {
            ticket: ticket.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            volume: rust_decimal_macros::dec!(0.1),
            price: rust_decimal_macros::dec!(1.1),
            current_price: rust_decimal_macros::dec!(1.1),
            profit: rust_decimal_macros::dec!(0),
            swap: rust_decimal_macros::dec!(0),
            time: Utc::now(),
            magic: 0,
            comment: comment.to_string(),
        }
    }

    #[tokio::test]
    async fn register_original_then_reject_duplicate() {
        let t = tracker();
        t.register_original("1001", "EURUSD", "G1").await.unwrap();
        let err = t.register_original("1001", "EURUSD", "G1").await.unwrap_err();
        assert_eq!(err, TrackerError::KeyExists("1001_EURUSD".to_string()));
    }

    #[tokio::test]
    async fn register_recovery_marks_original_hedged() {
        let t = tracker();
        t.register_original("1001", "EURUSD", "G1").await.unwrap();
        t.register_recovery("2001", "USDCHF", "1001", "EURUSD").await.unwrap();

        assert!(t.is_hedged("1001", "EURUSD").await);
        assert!(!t.needs_recovery("1001", "EURUSD").await);
        let recovery = t.get("2001", "USDCHF").await.unwrap();
        assert_eq!(recovery.hedging_for, Some("1001_EURUSD".to_string()));
    }

    #[tokio::test]
    async fn recovery_for_unknown_original_is_rejected() {
        let t = tracker();
        let err = t.register_recovery("2001", "USDCHF", "9999", "EURUSD").await.unwrap_err();
        assert_eq!(err, TrackerError::ParentNotFound("9999_EURUSD".to_string()));
    }

    #[tokio::test]
    async fn chain_depth_beyond_max_is_refused() {
        let t = tracker();
        t.register_original("1", "EURUSD", "G1").await.unwrap();
        t.register_recovery("2", "USDCHF", "1", "EURUSD").await.unwrap();
        t.register_recovery("3", "GBPUSD", "2", "USDCHF").await.unwrap();

        let err = t.register_recovery("4", "EURJPY", "3", "GBPUSD").await.unwrap_err();
        assert_eq!(err, TrackerError::ChainDepthExceeded { depth: 4, max: DEFAULT_MAX_CHAIN_DEPTH });
    }

    #[tokio::test]
    async fn sync_auto_registers_untracked_position_as_original() {
        let t = tracker();
        let positions = vec![position("1001", "EURUSD", "ARB_G1_EURUSD")];
        let outcome = t.sync_with_broker(&positions).await;

        assert_eq!(outcome.orders_auto_registered, 1);
        assert!(t.is_tracked("1001", "EURUSD").await);
        let order = t.get("1001", "EURUSD").await.unwrap();
        assert_eq!(order.role, OrderRole::Original);
        assert!(order.auto_registered);
    }

    #[tokio::test]
    async fn sync_removes_closed_orders_and_orphans_live_recovery() {
        let t = tracker();
        t.register_original("1001", "EURUSD", "G1").await.unwrap();
        t.register_recovery("2001", "USDCHF", "1001", "EURUSD").await.unwrap();

        // original 1001 no longer present among live positions; recovery 2001 still is.
        let positions = vec![position("2001", "USDCHF", "R1001_EURUSD")];
        let outcome = t.sync_with_broker(&positions).await;

        assert_eq!(outcome.orders_removed, 1);
        assert!(!t.is_tracked("1001", "EURUSD").await);
        let recovery = t.get("2001", "USDCHF").await.unwrap();
        assert_eq!(recovery.status, OrderStatus::Orphaned);
    }

    #[tokio::test]
    async fn priority_queue_round_trips() {
        let t = tracker();
        t.add_to_priority_queue("1001_EURUSD".to_string(), 0.9, "loss".to_string()).await;
        t.add_to_priority_queue("1002_GBPUSD".to_string(), 0.3, "loss".to_string()).await;

        let top = t.pop_priority().await.unwrap();
        assert_eq!(top.order_key, "1001_EURUSD");
    }
}
