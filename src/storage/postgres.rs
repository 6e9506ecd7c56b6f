//! # PostgreSQL Storage
//!
//! Production [`Storage`] implementation over sqlx. Queries use the
//! runtime API so the crate builds without a live database; schema
//! definition and migrations live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::error::{CoreError, Result};
use crate::models::{
    BehavioralEvent, BehavioralScore, Booking, EventStatus, IntegrationEvent, Lead,
    MaintenanceStats, NewBehavioralEvent, NewIntegrationEvent, NewSyncQueueItem, PriceChangeEvent,
    PropertyState, PropertyStats, RevenueStats, Segment, SyncError, SyncItemStatus, SyncQueueItem,
    SyncReport, SyncStatus, Tenant, TriggerRecord,
};
use crate::storage::Storage;

/// sqlx-backed [`Storage`] implementation
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the crate configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_enum<T: FromStr<Err = String>>(value: String) -> Result<T> {
    value.parse().map_err(CoreError::Database)
}

fn score_from_row(row: &PgRow) -> Result<BehavioralScore> {
    Ok(BehavioralScore {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        urgency_score: row.try_get("urgency_score")?,
        engagement_score: row.try_get("engagement_score")?,
        financial_score: row.try_get("financial_score")?,
        composite_score: row.try_get("composite_score")?,
        segment: parse_enum::<Segment>(row.try_get("segment")?)?,
        score_factors: row.try_get("score_factors")?,
        last_calculated_at: row.try_get("last_calculated_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn integration_event_from_row(row: &PgRow) -> Result<IntegrationEvent> {
    Ok(IntegrationEvent {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        source: row.try_get("source")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        payload: row.try_get("payload")?,
        status: parse_enum::<EventStatus>(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn sync_item_from_row(row: &PgRow) -> Result<SyncQueueItem> {
    Ok(SyncQueueItem {
        id: row.try_get("id")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        operation: row.try_get("operation")?,
        source: row.try_get("source")?,
        destination: row.try_get("destination")?,
        payload: row.try_get("payload")?,
        priority: row.try_get("priority")?,
        status: parse_enum::<SyncItemStatus>(row.try_get("status")?)?,
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        last_error: row.try_get("last_error")?,
        scheduled_at: row.try_get("scheduled_at")?,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn sync_report_from_row(row: &PgRow) -> Result<SyncReport> {
    let errors: Value = row.try_get("errors")?;
    let errors: Vec<SyncError> = serde_json::from_value(errors)?;
    Ok(SyncReport {
        id: row.try_get("id")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_seconds: row.try_get("duration_seconds")?,
        properties_synced: row.try_get("properties_synced")?,
        tenants_synced: row.try_get("tenants_synced")?,
        leads_synced: row.try_get("leads_synced")?,
        maintenance_synced: row.try_get("maintenance_synced")?,
        vacancies_updated: row.try_get("vacancies_updated")?,
        errors,
        error_count: row.try_get("error_count")?,
        status: parse_enum::<SyncStatus>(row.try_get("status")?)?,
        sync_type: row.try_get("sync_type")?,
        triggered_by: row.try_get("triggered_by")?,
        crm_last_sync: row.try_get("crm_last_sync")?,
        ledger_last_sync: row.try_get("ledger_last_sync")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn insert_behavioral_event(&self, event: NewBehavioralEvent) -> Result<BehavioralEvent> {
        let row = sqlx::query_as::<_, BehavioralEvent>(
            r#"
            INSERT INTO behavioral_events (lead_id, event_type, property_id, payload, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, lead_id, event_type, property_id, payload, created_at
            "#,
        )
        .bind(event.lead_id)
        .bind(&event.event_type)
        .bind(event.property_id)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn behavioral_events_for_lead(&self, lead_id: i64) -> Result<Vec<BehavioralEvent>> {
        let rows = sqlx::query_as::<_, BehavioralEvent>(
            r#"
            SELECT id, lead_id, event_type, property_id, payload, created_at
            FROM behavioral_events
            WHERE lead_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn leads_with_min_views_since(
        &self,
        min_views: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT lead_id
            FROM behavioral_events
            WHERE event_type = 'viewed' AND created_at > $1
            GROUP BY lead_id
            HAVING COUNT(*) >= $2
            ORDER BY lead_id
            "#,
        )
        .bind(since)
        .bind(min_views)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("lead_id").map_err(CoreError::from))
            .collect()
    }

    async fn behavioral_score(&self, lead_id: i64) -> Result<Option<BehavioralScore>> {
        let row = sqlx::query(
            r#"
            SELECT id, lead_id, urgency_score, engagement_score, financial_score,
                   composite_score, segment, score_factors, last_calculated_at,
                   created_at, updated_at
            FROM behavioral_scores
            WHERE lead_id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(score_from_row).transpose()
    }

    async fn upsert_behavioral_score(&self, score: BehavioralScore) -> Result<BehavioralScore> {
        let row = sqlx::query(
            r#"
            INSERT INTO behavioral_scores (
                lead_id, urgency_score, engagement_score, financial_score,
                composite_score, segment, score_factors, last_calculated_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT (lead_id) DO UPDATE SET
                urgency_score = EXCLUDED.urgency_score,
                engagement_score = EXCLUDED.engagement_score,
                financial_score = EXCLUDED.financial_score,
                composite_score = EXCLUDED.composite_score,
                segment = EXCLUDED.segment,
                score_factors = EXCLUDED.score_factors,
                last_calculated_at = EXCLUDED.last_calculated_at,
                updated_at = NOW()
            RETURNING id, lead_id, urgency_score, engagement_score, financial_score,
                      composite_score, segment, score_factors, last_calculated_at,
                      created_at, updated_at
            "#,
        )
        .bind(score.lead_id)
        .bind(score.urgency_score)
        .bind(score.engagement_score)
        .bind(score.financial_score)
        .bind(score.composite_score)
        .bind(score.segment.to_string())
        .bind(&score.score_factors)
        .bind(score.last_calculated_at)
        .fetch_one(&self.pool)
        .await?;
        score_from_row(&row)
    }

    async fn segment_counts(&self) -> Result<(i64, i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE composite_score >= 70) AS hot,
                COUNT(*) FILTER (WHERE composite_score >= 40 AND composite_score < 70) AS warm,
                COUNT(*) FILTER (WHERE composite_score >= 10 AND composite_score < 40) AS cold
            FROM behavioral_scores
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((
            row.try_get("hot")?,
            row.try_get("warm")?,
            row.try_get("cold")?,
        ))
    }

    async fn insert_integration_event(
        &self,
        event: NewIntegrationEvent,
    ) -> Result<IntegrationEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO integration_events (
                event_type, source, entity_type, entity_id, payload, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', NOW())
            RETURNING id, event_type, source, entity_type, entity_id, payload, status,
                      created_at, processed_at
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.source)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;
        integration_event_from_row(&row)
    }

    async fn mark_integration_event_processed(&self, event_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE integration_events SET status = 'processed', processed_at = NOW() WHERE id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_sync_item(&self, item: NewSyncQueueItem) -> Result<SyncQueueItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO sync_queue_items (
                entity_type, entity_id, operation, source, destination, payload,
                priority, status, retry_count, max_retries, last_error,
                scheduled_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, NOW(), NOW())
            RETURNING id, entity_type, entity_id, operation, source, destination, payload,
                      priority, status, retry_count, max_retries, last_error,
                      scheduled_at, processed_at, created_at, updated_at
            "#,
        )
        .bind(&item.entity_type)
        .bind(&item.entity_id)
        .bind(&item.operation)
        .bind(&item.source)
        .bind(&item.destination)
        .bind(&item.payload)
        .bind(item.priority)
        .bind(item.status.to_string())
        .bind(item.max_retries)
        .bind(&item.last_error)
        .bind(item.scheduled_at)
        .fetch_one(&self.pool)
        .await?;
        sync_item_from_row(&row)
    }

    async fn update_sync_item(&self, item: &SyncQueueItem) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_queue_items SET
                status = $2, retry_count = $3, last_error = $4,
                processed_at = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.status.to_string())
        .bind(item.retry_count)
        .bind(&item.last_error)
        .bind(item.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn retryable_sync_items(&self, limit: i64) -> Result<Vec<SyncQueueItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entity_type, entity_id, operation, source, destination, payload,
                   priority, status, retry_count, max_retries, last_error,
                   scheduled_at, processed_at, created_at, updated_at
            FROM sync_queue_items
            WHERE status = 'failed' AND retry_count < max_retries
            ORDER BY priority DESC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(sync_item_from_row).collect()
    }

    async fn count_sync_items(&self, status: SyncItemStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sync_queue_items WHERE status = $1")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn insert_sync_report(&self, report: &SyncReport) -> Result<SyncReport> {
        let errors = serde_json::to_value(&report.errors)?;
        let row = sqlx::query(
            r#"
            INSERT INTO sync_reports (
                started_at, completed_at, duration_seconds,
                properties_synced, tenants_synced, leads_synced, maintenance_synced,
                vacancies_updated, errors, error_count, status, sync_type,
                triggered_by, crm_last_sync, ledger_last_sync, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
            RETURNING id, started_at, completed_at, duration_seconds,
                      properties_synced, tenants_synced, leads_synced, maintenance_synced,
                      vacancies_updated, errors, error_count, status, sync_type,
                      triggered_by, crm_last_sync, ledger_last_sync, created_at, updated_at
            "#,
        )
        .bind(report.started_at)
        .bind(report.completed_at)
        .bind(report.duration_seconds)
        .bind(report.properties_synced)
        .bind(report.tenants_synced)
        .bind(report.leads_synced)
        .bind(report.maintenance_synced)
        .bind(report.vacancies_updated)
        .bind(&errors)
        .bind(report.error_count)
        .bind(report.status.to_string())
        .bind(&report.sync_type)
        .bind(&report.triggered_by)
        .bind(report.crm_last_sync)
        .bind(report.ledger_last_sync)
        .fetch_one(&self.pool)
        .await?;
        sync_report_from_row(&row)
    }

    async fn update_sync_report(&self, report: &SyncReport) -> Result<()> {
        let errors = serde_json::to_value(&report.errors)?;
        sqlx::query(
            r#"
            UPDATE sync_reports SET
                completed_at = $2, duration_seconds = $3,
                properties_synced = $4, tenants_synced = $5, leads_synced = $6,
                maintenance_synced = $7, vacancies_updated = $8, errors = $9,
                error_count = $10, status = $11, crm_last_sync = $12,
                ledger_last_sync = $13, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(report.id)
        .bind(report.completed_at)
        .bind(report.duration_seconds)
        .bind(report.properties_synced)
        .bind(report.tenants_synced)
        .bind(report.leads_synced)
        .bind(report.maintenance_synced)
        .bind(report.vacancies_updated)
        .bind(&errors)
        .bind(report.error_count)
        .bind(report.status.to_string())
        .bind(report.crm_last_sync)
        .bind(report.ledger_last_sync)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_sync_report(&self) -> Result<Option<SyncReport>> {
        let row = sqlx::query(
            r#"
            SELECT id, started_at, completed_at, duration_seconds,
                   properties_synced, tenants_synced, leads_synced, maintenance_synced,
                   vacancies_updated, errors, error_count, status, sync_type,
                   triggered_by, crm_last_sync, ledger_last_sync, created_at, updated_at
            FROM sync_reports
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(sync_report_from_row).transpose()
    }

    async fn sync_report_history(&self, limit: i64) -> Result<Vec<SyncReport>> {
        let rows = sqlx::query(
            r#"
            SELECT id, started_at, completed_at, duration_seconds,
                   properties_synced, tenants_synced, leads_synced, maintenance_synced,
                   vacancies_updated, errors, error_count, status, sync_type,
                   triggered_by, crm_last_sync, ledger_last_sync, created_at, updated_at
            FROM sync_reports
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(sync_report_from_row).collect()
    }

    async fn record_trigger(
        &self,
        trigger_type: &str,
        subject_id: Option<i64>,
        payload: Value,
    ) -> Result<TriggerRecord> {
        let row = sqlx::query_as::<_, TriggerRecord>(
            r#"
            INSERT INTO trigger_records (trigger_type, subject_id, payload, emitted_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, trigger_type, subject_id, payload, emitted_at
            "#,
        )
        .bind(trigger_type)
        .bind(subject_id)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn trigger_emitted_since(
        &self,
        trigger_type: &str,
        subject_id: i64,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM trigger_records
            WHERE trigger_type = $1 AND subject_id = $2 AND emitted_at > $3
            "#,
        )
        .bind(trigger_type)
        .bind(subject_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }

    async fn unprocessed_price_changes(&self, limit: i64) -> Result<Vec<PriceChangeEvent>> {
        let rows = sqlx::query_as::<_, PriceChangeEvent>(
            r#"
            SELECT id, property_id, property_address, old_price, new_price,
                   change_amount, change_percent, created_at, processed_at, trigger_emitted
            FROM price_change_events
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_price_change_processed(&self, id: i64, trigger_emitted: bool) -> Result<()> {
        sqlx::query(
            "UPDATE price_change_events SET processed_at = NOW(), trigger_emitted = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(trigger_emitted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn confirmed_bookings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, reference, property_id, property_address, crm_contact_id,
                   showing_at, status
            FROM bookings
            WHERE status = 'confirmed' AND showing_at >= $1 AND showing_at < $2
            ORDER BY showing_at ASC
            LIMIT $3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn lead(&self, lead_id: i64) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, first_name, last_name, email, source, crm_contact_id,
                   created_at, updated_at
            FROM leads
            WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn lead_by_email(&self, email: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, first_name, last_name, email, source, crm_contact_id,
                   created_at, updated_at
            FROM leads
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn lead_by_crm_contact(&self, crm_contact_id: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, first_name, last_name, email, source, crm_contact_id,
                   created_at, updated_at
            FROM leads
            WHERE crm_contact_id = $1
            "#,
        )
        .bind(crm_contact_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn all_lead_ids(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM leads ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(CoreError::from))
            .collect()
    }

    async fn crm_linked_leads_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Lead>> {
        let rows = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, first_name, last_name, email, source, crm_contact_id,
                   created_at, updated_at
            FROM leads
            WHERE crm_contact_id IS NOT NULL AND crm_contact_id != '' AND updated_at > $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn lead_counts(&self) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE created_at >= date_trunc('day', NOW())) AS new_today
            FROM leads
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("total")?, row.try_get("new_today")?))
    }

    async fn set_lead_crm_contact(&self, lead_id: i64, crm_contact_id: &str) -> Result<()> {
        sqlx::query("UPDATE leads SET crm_contact_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(lead_id)
            .bind(crm_contact_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn leads_who_viewed_property(&self, property_id: i64, limit: i64) -> Result<Vec<Lead>> {
        let rows = sqlx::query_as::<_, Lead>(
            r#"
            SELECT DISTINCT l.id, l.first_name, l.last_name, l.email, l.source,
                   l.crm_contact_id, l.created_at, l.updated_at
            FROM leads l
            JOIN behavioral_events e ON e.lead_id = l.id
            WHERE e.event_type = 'viewed' AND e.property_id = $1
            ORDER BY l.id
            LIMIT $2
            "#,
        )
        .bind(property_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn property(&self, property_id: i64) -> Result<Option<PropertyState>> {
        let row = sqlx::query_as::<_, PropertyState>(
            r#"
            SELECT id, ledger_id, address, status, status_source, is_vacant,
                   is_bookable, status_updated_at
            FROM property_states
            WHERE id = $1
            "#,
        )
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn property_by_ledger_id(&self, ledger_id: &str) -> Result<Option<PropertyState>> {
        let row = sqlx::query_as::<_, PropertyState>(
            r#"
            SELECT id, ledger_id, address, status, status_source, is_vacant,
                   is_bookable, status_updated_at
            FROM property_states
            WHERE ledger_id = $1
            "#,
        )
        .bind(ledger_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_property_occupancy(
        &self,
        property_id: i64,
        status: &str,
        status_source: &str,
        is_vacant: bool,
        is_bookable: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE property_states SET
                status = $2, status_source = $3, is_vacant = $4, is_bookable = $5,
                status_updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(property_id)
        .bind(status)
        .bind(status_source)
        .bind(is_vacant)
        .bind(is_bookable)
        .execute(&self.pool)
        .await?;
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
        sqlx::query(
            r#"
            UPDATE property_states SET
                status = $2, status_source = $3, is_vacant = $4, is_bookable = $5,
                status_updated_at = NOW()
            WHERE ledger_id = $1
            "#,
        )
        .bind(ledger_id)
        .bind(status)
        .bind(status_source)
        .bind(is_vacant)
        .bind(is_bookable)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn vacant_unbookable_properties(&self) -> Result<Vec<PropertyState>> {
        let rows = sqlx::query_as::<_, PropertyState>(
            r#"
            SELECT id, ledger_id, address, status, status_source, is_vacant,
                   is_bookable, status_updated_at
            FROM property_states
            WHERE is_vacant = TRUE AND is_bookable = FALSE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn force_property_bookable(&self, property_id: i64) -> Result<()> {
        sqlx::query("UPDATE property_states SET is_bookable = TRUE WHERE id = $1")
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn property_counts(&self) -> Result<PropertyStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_vacant) AS vacant,
                   COUNT(*) FILTER (WHERE NOT is_vacant OR status = 'occupied') AS occupied,
                   COUNT(*) FILTER (WHERE is_bookable) AS listed
            FROM property_states
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(PropertyStats {
            total: row.try_get("total")?,
            vacant: row.try_get("vacant")?,
            occupied: row.try_get("occupied")?,
            listed: row.try_get("listed")?,
            source: "ledger".to_string(),
        })
    }

    async fn active_tenants_missing_crm_contact(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, ledger_id, first_name, last_name, email, is_active,
                   crm_contact_id, lead_id, rent_amount, balance
            FROM tenants
            WHERE is_active = TRUE AND (crm_contact_id IS NULL OR crm_contact_id = '')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn link_tenant_to_lead(
        &self,
        tenant_id: i64,
        crm_contact_id: &str,
        lead_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE tenants SET crm_contact_id = $2, lead_id = $3 WHERE id = $1")
            .bind(tenant_id)
            .bind(crm_contact_id)
            .bind(lead_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revenue_stats(&self) -> Result<RevenueStats> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(rent_amount) FILTER (WHERE is_active), 0) AS projected_month,
                   COALESCE(SUM(balance) FILTER (WHERE is_active AND balance > 0), 0) AS pending
            FROM tenants
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let projected_month: f64 = row.try_get("projected_month")?;
        let pending: f64 = row.try_get("pending")?;
        Ok(RevenueStats {
            collected: (projected_month - pending).max(0.0),
            pending,
            projected_month,
            source: "ledger".to_string(),
        })
    }

    async fn maintenance_stats(&self) -> Result<MaintenanceStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE completed_at IS NULL) AS open_count,
                   COUNT(*) FILTER (WHERE is_emergency AND completed_at IS NULL) AS emergency_count,
                   COUNT(*) FILTER (WHERE completed_at >= date_trunc('month', NOW())) AS completed_this_month,
                   COALESCE(AVG(EXTRACT(EPOCH FROM (completed_at - created_at)) / 86400.0)
                            FILTER (WHERE completed_at IS NOT NULL), 0) AS avg_resolution_days
            FROM maintenance_tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(MaintenanceStats {
            open_count: row.try_get("open_count")?,
            emergency_count: row.try_get("emergency_count")?,
            completed_this_month: row.try_get("completed_this_month")?,
            avg_resolution_days: row.try_get("avg_resolution_days")?,
            source: "ledger".to_string(),
        })
    }
}
