//! # Storage Layer
//!
//! The persistent store is the single source of truth for every entity in
//! the integration core; the in-memory queues above it are a decoupling
//! layer only. This module defines the [`Storage`] trait seam plus two
//! implementations: [`PostgresStorage`] for production and
//! [`MemoryStorage`] for tests and embedded tooling.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    BehavioralEvent, BehavioralScore, Booking, IntegrationEvent, Lead, MaintenanceStats,
    NewBehavioralEvent, NewIntegrationEvent, NewSyncQueueItem, PriceChangeEvent, PropertyState,
    PropertyStats, RevenueStats, SyncItemStatus, SyncQueueItem, SyncReport, Tenant, TriggerRecord,
};

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Persistence seam for the integration core.
///
/// Query methods mirror the access patterns of the orchestrator, the
/// scoring engine, and the event processor; nothing here exposes raw SQL
/// or connection handles to callers.
#[async_trait]
pub trait Storage: Send + Sync {
    // --- Behavioral events ---

    async fn insert_behavioral_event(&self, event: NewBehavioralEvent) -> Result<BehavioralEvent>;

    /// All events for a lead, newest first
    async fn behavioral_events_for_lead(&self, lead_id: i64) -> Result<Vec<BehavioralEvent>>;

    /// Lead ids with at least `min_views` "viewed" events since `since`
    async fn leads_with_min_views_since(
        &self,
        min_views: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>>;

    // --- Behavioral scores ---

    async fn behavioral_score(&self, lead_id: i64) -> Result<Option<BehavioralScore>>;

    /// Insert or update the single live score row for `score.lead_id`
    async fn upsert_behavioral_score(&self, score: BehavioralScore) -> Result<BehavioralScore>;

    /// (hot, warm, cold) counts over all live score rows
    async fn segment_counts(&self) -> Result<(i64, i64, i64)>;

    // --- Integration events ---

    async fn insert_integration_event(&self, event: NewIntegrationEvent)
        -> Result<IntegrationEvent>;

    async fn mark_integration_event_processed(&self, event_id: i64) -> Result<()>;

    // --- Sync queue ---

    async fn insert_sync_item(&self, item: NewSyncQueueItem) -> Result<SyncQueueItem>;

    async fn update_sync_item(&self, item: &SyncQueueItem) -> Result<()>;

    /// Failed items with retry budget remaining, ordered priority desc then
    /// age asc, bounded by `limit`. Exhausted items are never selected.
    async fn retryable_sync_items(&self, limit: i64) -> Result<Vec<SyncQueueItem>>;

    async fn count_sync_items(&self, status: SyncItemStatus) -> Result<i64>;

    // --- Sync reports ---

    async fn insert_sync_report(&self, report: &SyncReport) -> Result<SyncReport>;

    async fn update_sync_report(&self, report: &SyncReport) -> Result<()>;

    async fn latest_sync_report(&self) -> Result<Option<SyncReport>>;

    async fn sync_report_history(&self, limit: i64) -> Result<Vec<SyncReport>>;

    // --- Trigger log ---

    async fn record_trigger(
        &self,
        trigger_type: &str,
        subject_id: Option<i64>,
        payload: Value,
    ) -> Result<TriggerRecord>;

    /// Watermark check: has this trigger type fired for this subject since
    /// `since`?
    async fn trigger_emitted_since(
        &self,
        trigger_type: &str,
        subject_id: i64,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    // --- Price change events ---

    /// Unprocessed rows, oldest first, bounded by `limit`
    async fn unprocessed_price_changes(&self, limit: i64) -> Result<Vec<PriceChangeEvent>>;

    async fn mark_price_change_processed(&self, id: i64, trigger_emitted: bool) -> Result<()>;

    // --- Bookings ---

    /// Confirmed bookings whose showing time falls in [from, to), oldest
    /// first, bounded by `limit`
    async fn confirmed_bookings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>>;

    // --- Leads ---

    async fn lead(&self, lead_id: i64) -> Result<Option<Lead>>;

    async fn lead_by_email(&self, email: &str) -> Result<Option<Lead>>;

    async fn lead_by_crm_contact(&self, crm_contact_id: &str) -> Result<Option<Lead>>;

    async fn all_lead_ids(&self) -> Result<Vec<i64>>;

    /// Leads with a CRM contact id whose local row changed since `since`
    async fn crm_linked_leads_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Lead>>;

    /// (total, new_today) counts
    async fn lead_counts(&self) -> Result<(i64, i64)>;

    /// Record the CRM-side id after a lead is mirrored there
    async fn set_lead_crm_contact(&self, lead_id: i64, crm_contact_id: &str) -> Result<()>;

    /// Leads with at least one "viewed" event against the property
    async fn leads_who_viewed_property(&self, property_id: i64, limit: i64) -> Result<Vec<Lead>>;

    // --- Properties ---

    async fn property(&self, property_id: i64) -> Result<Option<PropertyState>>;

    async fn property_by_ledger_id(&self, ledger_id: &str) -> Result<Option<PropertyState>>;

    async fn set_property_occupancy(
        &self,
        property_id: i64,
        status: &str,
        status_source: &str,
        is_vacant: bool,
        is_bookable: bool,
    ) -> Result<()>;

    async fn set_property_occupancy_by_ledger_id(
        &self,
        ledger_id: &str,
        status: &str,
        status_source: &str,
        is_vacant: bool,
        is_bookable: bool,
    ) -> Result<()>;

    /// Properties in the inconsistent vacant-but-not-bookable state
    async fn vacant_unbookable_properties(&self) -> Result<Vec<PropertyState>>;

    async fn force_property_bookable(&self, property_id: i64) -> Result<()>;

    async fn property_counts(&self) -> Result<PropertyStats>;

    // --- Tenants ---

    async fn active_tenants_missing_crm_contact(&self) -> Result<Vec<Tenant>>;

    async fn link_tenant_to_lead(
        &self,
        tenant_id: i64,
        crm_contact_id: &str,
        lead_id: i64,
    ) -> Result<()>;

    async fn revenue_stats(&self) -> Result<RevenueStats>;

    // --- Maintenance ---

    async fn maintenance_stats(&self) -> Result<MaintenanceStats>;
}
