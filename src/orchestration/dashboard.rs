//! # Unified Dashboard Aggregation
//!
//! Assembles the cross-system dashboard from the local store. Every
//! section sits behind its own error boundary: a failed sub-query yields
//! that section's zero-value default, never a failed dashboard.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::models::{
    LastSyncInfo, LeadStats, MaintenanceStats, PropertyStats, RevenueStats, SyncItemStatus,
    SystemHealthStats, UnifiedDashboard,
};
use crate::storage::Storage;

/// Build the dashboard snapshot. `crm_connected`/`ledger_connected` report
/// whether those clients are configured, not their live health.
pub async fn build_dashboard(
    storage: &Arc<dyn Storage>,
    last_sync: LastSyncInfo,
    crm_connected: bool,
    ledger_connected: bool,
) -> UnifiedDashboard {
    let properties = match storage.property_counts().await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(error = %err, "Dashboard property stats degraded");
            PropertyStats::default()
        }
    };

    let leads = lead_stats(storage).await;

    let maintenance = match storage.maintenance_stats().await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(error = %err, "Dashboard maintenance stats degraded");
            MaintenanceStats::default()
        }
    };

    let revenue = match storage.revenue_stats().await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(error = %err, "Dashboard revenue stats degraded");
            RevenueStats::default()
        }
    };

    let queued_sync_items = storage
        .count_sync_items(SyncItemStatus::Pending)
        .await
        .unwrap_or(0);
    let failed_sync_items = storage
        .count_sync_items(SyncItemStatus::Failed)
        .await
        .unwrap_or(0)
        + storage
            .count_sync_items(SyncItemStatus::Exhausted)
            .await
            .unwrap_or(0);

    UnifiedDashboard {
        properties,
        leads,
        maintenance,
        revenue,
        last_sync,
        system_health: SystemHealthStats {
            crm_connected,
            ledger_connected,
            queued_sync_items,
            failed_sync_items,
        },
        generated_at: Utc::now(),
    }
}

async fn lead_stats(storage: &Arc<dyn Storage>) -> LeadStats {
    let (total, new_today) = match storage.lead_counts().await {
        Ok(counts) => counts,
        Err(err) => {
            warn!(error = %err, "Dashboard lead counts degraded");
            return LeadStats::default();
        }
    };

    let (hot, warm, cold) = storage.segment_counts().await.unwrap_or((0, 0, 0));

    LeadStats {
        total,
        hot,
        warm,
        cold,
        new_today,
        source: "rentflow+crm".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_failed_section_degrades_to_default() {
        let memory = Arc::new(MemoryStorage::new());
        memory.fail_on("maintenance_stats");
        memory.fail_on("revenue_stats");

        let storage: Arc<dyn Storage> = memory.clone();
        let dashboard = build_dashboard(&storage, LastSyncInfo::default(), true, false).await;

        assert_eq!(dashboard.maintenance, MaintenanceStats::default());
        assert_eq!(dashboard.revenue, RevenueStats::default());
        // Healthy sections still populated
        assert_eq!(dashboard.leads.total, 0);
        assert!(dashboard.system_health.crm_connected);
        assert!(!dashboard.system_health.ledger_connected);
    }
}
