//! Individual Order Tracker data model (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRole {
    Original,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    NotHedged,
    Hedged,
    Orphaned,
}

/// Key format: `"{ticket}_{symbol}"` (spec §3).
pub fn order_key(ticket: &str, symbol: &str) -> String {
    format!("{ticket}_{symbol}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedOrder {
    pub ticket: String,
    pub symbol: String,
    pub group_id: String,
    pub role: OrderRole,
    pub status: OrderStatus,
    pub recovery_orders: Vec<String>,
    pub hedging_for: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sync: DateTime<Utc>,
    pub auto_registered: bool,
    pub comment: String,
}

impl TrackedOrder {
    pub fn key(&self) -> String {
        order_key(&self.ticket, &self.symbol)
    }

    pub fn new_original(ticket: String, symbol: String, group_id: String, now: DateTime<Utc>) -> Self {
        Self {
            ticket,
            symbol,
            group_id,
            role: OrderRole::Original,
            status: OrderStatus::NotHedged,
            recovery_orders: Vec::new(),
            hedging_for: None,
            created_at: now,
            last_sync: now,
            auto_registered: false,
            comment: String::new(),
        }
    }

    pub fn new_recovery(
        ticket: String,
        symbol: String,
        group_id: String,
        hedging_for: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket,
            symbol,
            group_id,
            role: OrderRole::Recovery,
            status: OrderStatus::NotHedged,
            recovery_orders: Vec::new(),
            hedging_for: Some(hedging_for),
            created_at: now,
            last_sync: now,
            auto_registered: false,
            comment: String::new(),
        }
    }

    pub fn needs_recovery(&self) -> bool {
        matches!(self.status, OrderStatus::NotHedged | OrderStatus::Orphaned)
    }

    pub fn is_hedged(&self) -> bool {
        self.status == OrderStatus::Hedged
    }
}
