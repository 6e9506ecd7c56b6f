//! # In-Memory Storage
//!
//! A complete [`Storage`] implementation over parking_lot-guarded maps.
//! Used by the test suite and by embedded tooling that runs the
//! orchestration pipeline without a database. Supports targeted failure
//! injection so tests can exercise the degradation paths.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::models::{
    BehavioralEvent, BehavioralScore, Booking, EventStatus, IntegrationEvent, Lead,
    MaintenanceStats, MaintenanceTicket, NewBehavioralEvent, NewIntegrationEvent,
    NewSyncQueueItem, PriceChangeEvent, PropertyState, PropertyStats, RevenueStats, Segment,
    SyncItemStatus, SyncQueueItem, SyncReport, Tenant, TriggerRecord,
};
use crate::storage::Storage;

#[derive(Default)]
struct Tables {
    behavioral_events: Vec<BehavioralEvent>,
    behavioral_scores: HashMap<i64, BehavioralScore>,
    integration_events: Vec<IntegrationEvent>,
    sync_items: Vec<SyncQueueItem>,
    sync_reports: Vec<SyncReport>,
    trigger_records: Vec<TriggerRecord>,
    price_changes: Vec<PriceChangeEvent>,
    bookings: Vec<Booking>,
    leads: Vec<Lead>,
    properties: Vec<PropertyState>,
    tenants: Vec<Tenant>,
    maintenance: Vec<MaintenanceTicket>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Storage`] backed by parking_lot locks
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    failing_methods: RwLock<HashSet<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call to the named trait method fail with a
    /// database error, until [`clear_failures`](Self::clear_failures)
    pub fn fail_on(&self, method: &str) {
        self.failing_methods.write().insert(method.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_methods.write().clear();
    }

    fn check_fail(&self, method: &str) -> Result<()> {
        if self.failing_methods.read().contains(method) {
            return Err(CoreError::Database(format!("injected failure: {method}")));
        }
        Ok(())
    }

    // --- Seed helpers for tests and tooling ---

    pub fn seed_lead(&self, lead: Lead) {
        self.tables.write().leads.push(lead);
    }

    pub fn seed_property(&self, property: PropertyState) {
        self.tables.write().properties.push(property);
    }

    pub fn seed_tenant(&self, tenant: Tenant) {
        self.tables.write().tenants.push(tenant);
    }

    pub fn seed_booking(&self, booking: Booking) {
        self.tables.write().bookings.push(booking);
    }

    pub fn seed_price_change(&self, event: PriceChangeEvent) {
        self.tables.write().price_changes.push(event);
    }

    pub fn seed_maintenance(&self, ticket: MaintenanceTicket) {
        self.tables.write().maintenance.push(ticket);
    }

    // --- Inspection helpers for tests ---

    pub fn integration_events(&self) -> Vec<IntegrationEvent> {
        self.tables.read().integration_events.clone()
    }

    pub fn sync_items(&self) -> Vec<SyncQueueItem> {
        self.tables.read().sync_items.clone()
    }

    pub fn trigger_records(&self) -> Vec<TriggerRecord> {
        self.tables.read().trigger_records.clone()
    }

    pub fn sync_reports(&self) -> Vec<SyncReport> {
        self.tables.read().sync_reports.clone()
    }

    pub fn properties(&self) -> Vec<PropertyState> {
        self.tables.read().properties.clone()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.tables.read().leads.clone()
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.tables.read().tenants.clone()
    }

    pub fn behavioral_events(&self) -> Vec<BehavioralEvent> {
        self.tables.read().behavioral_events.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_behavioral_event(&self, event: NewBehavioralEvent) -> Result<BehavioralEvent> {
        self.check_fail("insert_behavioral_event")?;
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let stored = BehavioralEvent {
            id,
            lead_id: event.lead_id,
            event_type: event.event_type,
            property_id: event.property_id,
            payload: event.payload,
            created_at: Utc::now(),
        };
        tables.behavioral_events.push(stored.clone());
        Ok(stored)
    }

    async fn behavioral_events_for_lead(&self, lead_id: i64) -> Result<Vec<BehavioralEvent>> {
        self.check_fail("behavioral_events_for_lead")?;
        let mut events: Vec<_> = self
            .tables
            .read()
            .behavioral_events
            .iter()
            .filter(|e| e.lead_id == lead_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn leads_with_min_views_since(
        &self,
        min_views: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        self.check_fail("leads_with_min_views_since")?;
        let tables = self.tables.read();
        let mut counts: HashMap<i64, i64> = HashMap::new();
        for event in &tables.behavioral_events {
            if event.event_type == "viewed" && event.created_at > since {
                *counts.entry(event.lead_id).or_insert(0) += 1;
            }
        }
        let mut ids: Vec<i64> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_views)
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn behavioral_score(&self, lead_id: i64) -> Result<Option<BehavioralScore>> {
        self.check_fail("behavioral_score")?;
        Ok(self.tables.read().behavioral_scores.get(&lead_id).cloned())
    }

    async fn upsert_behavioral_score(&self, mut score: BehavioralScore) -> Result<BehavioralScore> {
        self.check_fail("upsert_behavioral_score")?;
        let mut tables = self.tables.write();
        match tables.behavioral_scores.get(&score.lead_id) {
            Some(existing) => {
                score.id = existing.id;
                score.created_at = existing.created_at;
            }
            None => {
                score.id = tables.next_id();
            }
        }
        score.updated_at = Utc::now();
        tables.behavioral_scores.insert(score.lead_id, score.clone());
        Ok(score)
    }

    async fn segment_counts(&self) -> Result<(i64, i64, i64)> {
        self.check_fail("segment_counts")?;
        let tables = self.tables.read();
        let mut hot = 0;
        let mut warm = 0;
        let mut cold = 0;
        for score in tables.behavioral_scores.values() {
            match Segment::from_score(score.composite_score) {
                Segment::Hot => hot += 1,
                Segment::Warm => warm += 1,
                Segment::Cold => cold += 1,
                Segment::Dormant => {}
            }
        }
        Ok((hot, warm, cold))
    }

    async fn insert_integration_event(
        &self,
        event: NewIntegrationEvent,
    ) -> Result<IntegrationEvent> {
        self.check_fail("insert_integration_event")?;
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let stored = IntegrationEvent {
            id,
            event_type: event.event_type,
            source: event.source,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            payload: event.payload,
            status: EventStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        tables.integration_events.push(stored.clone());
        Ok(stored)
    }

    async fn mark_integration_event_processed(&self, event_id: i64) -> Result<()> {
        self.check_fail("mark_integration_event_processed")?;
        let mut tables = self.tables.write();
        if let Some(event) = tables.integration_events.iter_mut().find(|e| e.id == event_id) {
            event.status = EventStatus::Processed;
            event.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_sync_item(&self, item: NewSyncQueueItem) -> Result<SyncQueueItem> {
        self.check_fail("insert_sync_item")?;
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let now = Utc::now();
        let stored = SyncQueueItem {
            id,
            entity_type: item.entity_type,
            entity_id: item.entity_id,
            operation: item.operation,
            source: item.source,
            destination: item.destination,
            payload: item.payload,
            priority: item.priority,
            status: item.status,
            retry_count: 0,
            max_retries: item.max_retries,
            last_error: item.last_error,
            scheduled_at: item.scheduled_at,
            processed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.sync_items.push(stored.clone());
        Ok(stored)
    }

    async fn update_sync_item(&self, item: &SyncQueueItem) -> Result<()> {
        self.check_fail("update_sync_item")?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.sync_items.iter_mut().find(|i| i.id == item.id) {
            *existing = item.clone();
        }
        Ok(())
    }

    async fn retryable_sync_items(&self, limit: i64) -> Result<Vec<SyncQueueItem>> {
        self.check_fail("retryable_sync_items")?;
        let tables = self.tables.read();
        let mut items: Vec<_> = tables
            .sync_items
            .iter()
            .filter(|i| i.status == SyncItemStatus::Failed && i.retry_count < i.max_retries)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn count_sync_items(&self, status: SyncItemStatus) -> Result<i64> {
        self.check_fail("count_sync_items")?;
        Ok(self
            .tables
            .read()
            .sync_items
            .iter()
            .filter(|i| i.status == status)
            .count() as i64)
    }

    async fn insert_sync_report(&self, report: &SyncReport) -> Result<SyncReport> {
        self.check_fail("insert_sync_report")?;
        let mut tables = self.tables.write();
        let mut stored = report.clone();
        stored.id = tables.next_id();
        tables.sync_reports.push(stored.clone());
        Ok(stored)
    }

    async fn update_sync_report(&self, report: &SyncReport) -> Result<()> {
        self.check_fail("update_sync_report")?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.sync_reports.iter_mut().find(|r| r.id == report.id) {
            *existing = report.clone();
        }
        Ok(())
    }

    async fn latest_sync_report(&self) -> Result<Option<SyncReport>> {
        self.check_fail("latest_sync_report")?;
        Ok(self
            .tables
            .read()
            .sync_reports
            .iter()
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn sync_report_history(&self, limit: i64) -> Result<Vec<SyncReport>> {
        self.check_fail("sync_report_history")?;
        let mut reports = self.tables.read().sync_reports.clone();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit as usize);
        Ok(reports)
    }

    async fn record_trigger(
        &self,
        trigger_type: &str,
        subject_id: Option<i64>,
        payload: Value,
    ) -> Result<TriggerRecord> {
        self.check_fail("record_trigger")?;
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let record = TriggerRecord {
            id,
            trigger_type: trigger_type.to_string(),
            subject_id,
            payload,
            emitted_at: Utc::now(),
        };
        tables.trigger_records.push(record.clone());
        Ok(record)
    }

    async fn trigger_emitted_since(
        &self,
        trigger_type: &str,
        subject_id: i64,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_fail("trigger_emitted_since")?;
        Ok(self.tables.read().trigger_records.iter().any(|r| {
            r.trigger_type == trigger_type
                && r.subject_id == Some(subject_id)
                && r.emitted_at > since
        }))
    }

    async fn unprocessed_price_changes(&self, limit: i64) -> Result<Vec<PriceChangeEvent>> {
        self.check_fail("unprocessed_price_changes")?;
        let tables = self.tables.read();
        let mut events: Vec<_> = tables
            .price_changes
            .iter()
            .filter(|e| e.processed_at.is_none())
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn mark_price_change_processed(&self, id: i64, trigger_emitted: bool) -> Result<()> {
        self.check_fail("mark_price_change_processed")?;
        let mut tables = self.tables.write();
        if let Some(event) = tables.price_changes.iter_mut().find(|e| e.id == id) {
            event.processed_at = Some(Utc::now());
            event.trigger_emitted = trigger_emitted;
        }
        Ok(())
    }

    async fn confirmed_bookings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        self.check_fail("confirmed_bookings_between")?;
        let tables = self.tables.read();
        let mut bookings: Vec<_> = tables
            .bookings
            .iter()
            .filter(|b| b.status == "confirmed" && b.showing_at >= from && b.showing_at < to)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.showing_at.cmp(&b.showing_at));
        bookings.truncate(limit as usize);
        Ok(bookings)
    }

    async fn lead(&self, lead_id: i64) -> Result<Option<Lead>> {
        self.check_fail("lead")?;
        Ok(self
            .tables
            .read()
            .leads
            .iter()
            .find(|l| l.id == lead_id)
            .cloned())
    }

    async fn lead_by_email(&self, email: &str) -> Result<Option<Lead>> {
        self.check_fail("lead_by_email")?;
        Ok(self
            .tables
            .read()
            .leads
            .iter()
            .find(|l| l.email == email)
            .cloned())
    }

    async fn lead_by_crm_contact(&self, crm_contact_id: &str) -> Result<Option<Lead>> {
        self.check_fail("lead_by_crm_contact")?;
        Ok(self
            .tables
            .read()
            .leads
            .iter()
            .find(|l| l.crm_contact_id.as_deref() == Some(crm_contact_id))
            .cloned())
    }

    async fn all_lead_ids(&self) -> Result<Vec<i64>> {
        self.check_fail("all_lead_ids")?;
        Ok(self.tables.read().leads.iter().map(|l| l.id).collect())
    }

    async fn crm_linked_leads_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Lead>> {
        self.check_fail("crm_linked_leads_updated_since")?;
        Ok(self
            .tables
            .read()
            .leads
            .iter()
            .filter(|l| {
                l.crm_contact_id.as_deref().is_some_and(|id| !id.is_empty())
                    && l.updated_at > since
            })
            .cloned()
            .collect())
    }

    async fn lead_counts(&self) -> Result<(i64, i64)> {
        self.check_fail("lead_counts")?;
        let tables = self.tables.read();
        let total = tables.leads.len() as i64;
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let new_today = tables
            .leads
            .iter()
            .filter(|l| l.created_at >= midnight)
            .count() as i64;
        Ok((total, new_today))
    }

    async fn set_lead_crm_contact(&self, lead_id: i64, crm_contact_id: &str) -> Result<()> {
        self.check_fail("set_lead_crm_contact")?;
        let mut tables = self.tables.write();
        if let Some(lead) = tables.leads.iter_mut().find(|l| l.id == lead_id) {
            lead.crm_contact_id = Some(crm_contact_id.to_string());
            lead.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn leads_who_viewed_property(&self, property_id: i64, limit: i64) -> Result<Vec<Lead>> {
        self.check_fail("leads_who_viewed_property")?;
        let tables = self.tables.read();
        let mut viewer_ids: Vec<i64> = tables
            .behavioral_events
            .iter()
            .filter(|e| e.event_type == "viewed" && e.property_id == Some(property_id))
            .map(|e| e.lead_id)
            .collect();
        viewer_ids.sort_unstable();
        viewer_ids.dedup();
        viewer_ids.truncate(limit as usize);
        Ok(tables
            .leads
            .iter()
            .filter(|l| viewer_ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn property(&self, property_id: i64) -> Result<Option<PropertyState>> {
        self.check_fail("property")?;
        Ok(self
            .tables
            .read()
            .properties
            .iter()
            .find(|p| p.id == property_id)
            .cloned())
    }

    async fn property_by_ledger_id(&self, ledger_id: &str) -> Result<Option<PropertyState>> {
        self.check_fail("property_by_ledger_id")?;
        Ok(self
            .tables
            .read()
            .properties
            .iter()
            .find(|p| p.ledger_id == ledger_id)
            .cloned())
    }

    async fn set_property_occupancy(
        &self,
        property_id: i64,
        status: &str,
        status_source: &str,
        is_vacant: bool,
        is_bookable: bool,
    ) -> Result<()> {
        self.check_fail("set_property_occupancy")?;
        let mut tables = self.tables.write();
        if let Some(property) = tables.properties.iter_mut().find(|p| p.id == property_id) {
            property.status = status.to_string();
            property.status_source = status_source.to_string();
            property.is_vacant = is_vacant;
            property.is_bookable = is_bookable;
            property.status_updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_property_occupancy_by_ledger_id(
        &self,
        ledger_id: &str,
        status: &str,
        status_source: &str,
        is_vacant: bool,
        is_bookable: bool,
    ) -> Result<()> {
        self.check_fail("set_property_occupancy_by_ledger_id")?;
        let mut tables = self.tables.write();
        if let Some(property) = tables.properties.iter_mut().find(|p| p.ledger_id == ledger_id) {
            property.status = status.to_string();
            property.status_source = status_source.to_string();
            property.is_vacant = is_vacant;
            property.is_bookable = is_bookable;
            property.status_updated_at = Utc::now();
        }
        Ok(())
    }

    async fn vacant_unbookable_properties(&self) -> Result<Vec<PropertyState>> {
        self.check_fail("vacant_unbookable_properties")?;
        Ok(self
            .tables
            .read()
            .properties
            .iter()
            .filter(|p| p.is_vacant && !p.is_bookable)
            .cloned()
            .collect())
    }

    async fn force_property_bookable(&self, property_id: i64) -> Result<()> {
        self.check_fail("force_property_bookable")?;
        let mut tables = self.tables.write();
        if let Some(property) = tables.properties.iter_mut().find(|p| p.id == property_id) {
            property.is_bookable = true;
        }
        Ok(())
    }

    async fn property_counts(&self) -> Result<PropertyStats> {
        self.check_fail("property_counts")?;
        let tables = self.tables.read();
        Ok(PropertyStats {
            total: tables.properties.len() as i64,
            vacant: tables.properties.iter().filter(|p| p.is_vacant).count() as i64,
            occupied: tables
                .properties
                .iter()
                .filter(|p| !p.is_vacant || p.status == "occupied")
                .count() as i64,
            listed: tables.properties.iter().filter(|p| p.is_bookable).count() as i64,
            source: "ledger".to_string(),
        })
    }

    async fn active_tenants_missing_crm_contact(&self) -> Result<Vec<Tenant>> {
        self.check_fail("active_tenants_missing_crm_contact")?;
        Ok(self
            .tables
            .read()
            .tenants
            .iter()
            .filter(|t| t.is_active && t.crm_contact_id.as_deref().unwrap_or("").is_empty())
            .cloned()
            .collect())
    }

    async fn link_tenant_to_lead(
        &self,
        tenant_id: i64,
        crm_contact_id: &str,
        lead_id: i64,
    ) -> Result<()> {
        self.check_fail("link_tenant_to_lead")?;
        let mut tables = self.tables.write();
        if let Some(tenant) = tables.tenants.iter_mut().find(|t| t.id == tenant_id) {
            tenant.crm_contact_id = Some(crm_contact_id.to_string());
            tenant.lead_id = Some(lead_id);
        }
        Ok(())
    }

    async fn revenue_stats(&self) -> Result<RevenueStats> {
        self.check_fail("revenue_stats")?;
        let tables = self.tables.read();
        let projected_month: f64 = tables
            .tenants
            .iter()
            .filter(|t| t.is_active)
            .map(|t| t.rent_amount)
            .sum();
        let pending: f64 = tables
            .tenants
            .iter()
            .filter(|t| t.is_active && t.balance > 0.0)
            .map(|t| t.balance)
            .sum();
        Ok(RevenueStats {
            collected: (projected_month - pending).max(0.0),
            pending,
            projected_month,
            source: "ledger".to_string(),
        })
    }

    async fn maintenance_stats(&self) -> Result<MaintenanceStats> {
        self.check_fail("maintenance_stats")?;
        let tables = self.tables.read();
        Ok(MaintenanceStats {
            open_count: tables.maintenance.len() as i64,
            emergency_count: tables.maintenance.iter().filter(|t| t.is_emergency).count() as i64,
            completed_this_month: 0,
            avg_resolution_days: 0.0,
            source: "ledger".to_string(),
        })
    }
}
