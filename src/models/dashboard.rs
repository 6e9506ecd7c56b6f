//! # Unified Dashboard Aggregates
//!
//! Read-only snapshot assembled from the local store across every synced
//! system. Each section defaults to zeroes when its source query fails, so
//! a degraded subsystem can never fail the whole dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyStats {
    pub total: i64,
    pub vacant: i64,
    pub occupied: i64,
    pub listed: i64,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total: i64,
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
    pub new_today: i64,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceStats {
    pub open_count: i64,
    pub emergency_count: i64,
    pub completed_this_month: i64,
    pub avg_resolution_days: f64,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueStats {
    pub collected: f64,
    pub pending: f64,
    pub projected_month: f64,
    pub source: String,
}

/// Most recent completion time of each sync pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastSyncInfo {
    pub crm: Option<DateTime<Utc>>,
    pub ledger_property: Option<DateTime<Utc>>,
    pub ledger_tenant: Option<DateTime<Utc>>,
    pub ledger_maintenance: Option<DateTime<Utc>>,
    pub full_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemHealthStats {
    pub crm_connected: bool,
    pub ledger_connected: bool,
    pub queued_sync_items: i64,
    pub failed_sync_items: i64,
}

/// The unified cross-system dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDashboard {
    pub properties: PropertyStats,
    pub leads: LeadStats,
    pub maintenance: MaintenanceStats,
    pub revenue: RevenueStats,
    pub last_sync: LastSyncInfo,
    pub system_health: SystemHealthStats,
    pub generated_at: DateTime<Utc>,
}
