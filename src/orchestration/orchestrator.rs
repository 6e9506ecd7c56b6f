//! # Integration Orchestrator
//!
//! Central coordinator for three-way state synchronization. Owns the
//! bounded event and sync queues, the background consumers, the
//! reconciliation loop, the full-sync pipeline, and the state-transition
//! handlers that react to business events.
//!
//! ## Lifecycle
//!
//! `start()` launches the event-queue consumer, the sync-queue consumer,
//! and the reconciliation loop exactly once; concurrent and repeated calls
//! are no-ops. `stop()` fires the shutdown signal every background task
//! and every retry wait selects on, then tears down the queues. Both are
//! idempotent and safe to call in any order.
//!
//! ## Degradation rules
//!
//! The store is the source of truth. A full in-memory queue degrades to a
//! direct write, never a dropped write. Remote side-effects fired from
//! handlers are spawned, never awaited by the caller; their failures are
//! captured as retryable sync queue items.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::clients::{CrmClient, LedgerClient};
use crate::config::RentflowConfig;
use crate::constants::{behavior, events, operations, sources};
use crate::error::{CoreError, Result};
use crate::events::triggers::{CanonicalTrigger, TriggerSink};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::models::{
    Booking, Lead, LeadSyncOutcome, MaintenanceTicket, NewIntegrationEvent, NewSyncQueueItem,
    SyncError, SyncItemStatus, SyncQueueItem, SyncReport, SyncStatus, UnifiedDashboard,
};
use crate::models::dashboard::LastSyncInfo;
use crate::notify::Notifier;
use crate::orchestration::{dashboard, reconciliation};
use crate::resilience::retry::{RemoteError, RemoteResponse, RetryError, RetryPolicy};
use crate::scoring::{BehaviorTracker, ScoringEngine};
use crate::storage::Storage;

/// Default priority for retry items captured from failed side-effects
const SIDE_EFFECT_PRIORITY: i32 = 5;

/// Delay before a captured side-effect failure becomes retry-eligible
const SIDE_EFFECT_RETRY_DELAY_MINUTES: i64 = 5;

/// Bounded batch for one retry sweep
const RETRY_SWEEP_BATCH: i64 = 100;

/// Leads touched within this window are pushed to the CRM on each sync
const LEAD_SYNC_WINDOW_HOURS: i64 = 2;

/// Outcome of one attempt against a remote system
enum SyncAttempt {
    Completed(RemoteResponse),
    /// 4xx-class response: retrying cannot succeed
    Permanent(String),
    /// Local retry budget exhausted on retryable failures
    Transient(String),
    /// Shutdown fired mid-wait; the item is left untouched
    Cancelled,
}

fn classify_remote(result: std::result::Result<RemoteResponse, RetryError>) -> SyncAttempt {
    match result {
        Ok(response) if response.is_success() => SyncAttempt::Completed(response),
        Ok(response) => SyncAttempt::Permanent(format!(
            "remote returned status {status}",
            status = response.status
        )),
        Err(RetryError::Cancelled) => SyncAttempt::Cancelled,
        Err(err @ RetryError::Exhausted { .. }) => SyncAttempt::Transient(err.to_string()),
    }
}

/// Resolve the webhook event type through the `event_type`/`type`/
/// `eventType` fallback chain the upstream systems use
pub fn extract_event_type(payload: &Value) -> Option<&str> {
    payload
        .get("event_type")
        .or_else(|| payload.get("type"))
        .or_else(|| payload.get("eventType"))
        .and_then(Value::as_str)
}

struct QueueHandles {
    event_tx: RwLock<Option<mpsc::Sender<NewIntegrationEvent>>>,
    sync_tx: RwLock<Option<mpsc::Sender<SyncQueueItem>>>,
}

/// Central coordinator for cross-system synchronization. Cheap to clone;
/// clones share all state.
#[derive(Clone)]
pub struct IntegrationOrchestrator {
    storage: Arc<dyn Storage>,
    crm: Option<Arc<dyn CrmClient>>,
    ledger: Option<Arc<dyn LedgerClient>>,
    scoring: Arc<ScoringEngine>,
    tracker: Arc<BehaviorTracker>,
    notifier: Arc<dyn Notifier>,
    retry_policy: Arc<RetryPolicy>,
    config: Arc<RentflowConfig>,
    lifecycle: Arc<Lifecycle>,
    queues: Arc<QueueHandles>,
    last_sync: Arc<RwLock<LastSyncInfo>>,
}

impl IntegrationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        crm: Option<Arc<dyn CrmClient>>,
        ledger: Option<Arc<dyn LedgerClient>>,
        scoring: Arc<ScoringEngine>,
        tracker: Arc<BehaviorTracker>,
        notifier: Arc<dyn Notifier>,
        config: RentflowConfig,
    ) -> Self {
        info!("🔄 Initializing integration orchestrator (three-way sync)");
        let retry_policy = Arc::new(RetryPolicy::new((&config.retry).into()));
        Self {
            storage,
            crm,
            ledger,
            scoring,
            tracker,
            notifier,
            retry_policy,
            config: Arc::new(config),
            lifecycle: Arc::new(Lifecycle::new()),
            queues: Arc::new(QueueHandles {
                event_tx: RwLock::new(None),
                sync_tx: RwLock::new(None),
            }),
            last_sync: Arc::new(RwLock::new(LastSyncInfo::default())),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn scoring(&self) -> &Arc<ScoringEngine> {
        &self.scoring
    }

    pub fn tracker(&self) -> &Arc<BehaviorTracker> {
        &self.tracker
    }

    /// Launch the queue consumers and the reconciliation loop. Idempotent.
    pub fn start(&self) {
        if !self.lifecycle.begin_start() {
            return;
        }

        info!("🚀 Starting integration orchestrator background processes");

        let (event_tx, event_rx) = mpsc::channel(self.config.queues.event_capacity);
        let (sync_tx, sync_rx) = mpsc::channel(self.config.queues.sync_capacity);
        *self.queues.event_tx.write() = Some(event_tx);
        *self.queues.sync_tx.write() = Some(sync_tx);

        let events = self.clone();
        tokio::spawn(async move { events.event_queue_consumer(event_rx).await });

        let syncs = self.clone();
        tokio::spawn(async move { syncs.sync_queue_consumer(sync_rx).await });

        let reconciler = self.clone();
        tokio::spawn(async move { reconciler.reconciliation_loop().await });

        self.lifecycle.complete_start();
        info!("✅ Integration orchestrator running");
    }

    /// Signal all background tasks to exit and tear down the queues.
    /// Idempotent.
    pub fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }

        // Dropping the senders closes the channels; consumers exit on
        // either the closed channel or the shutdown signal, whichever they
        // observe first.
        *self.queues.event_tx.write() = None;
        *self.queues.sync_tx.write() = None;

        self.lifecycle.complete_stop();
        info!("🛑 Integration orchestrator stopped");
    }

    // --- Queues -----------------------------------------------------------

    /// Record an integration event: best-effort fast path through the
    /// bounded queue, durable slow path straight to storage. Never drops.
    pub async fn emit_event(&self, event: NewIntegrationEvent) -> Result<()> {
        let sender = self.queues.event_tx.read().clone();
        if let Some(sender) = sender {
            match sender.try_send(event) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                    debug!(event_type = %event.event_type,
                        "Event queue saturated; persisting directly");
                    self.storage.insert_integration_event(event).await?;
                    return Ok(());
                }
            }
        }
        self.storage.insert_integration_event(event).await?;
        Ok(())
    }

    /// Persist a unit of outbound work and offer it to the consumer. The
    /// insert is the durability guarantee; the channel is throughput only.
    pub async fn enqueue_sync(&self, item: NewSyncQueueItem) -> Result<SyncQueueItem> {
        let stored = self.storage.insert_sync_item(item).await?;
        let sender = self.queues.sync_tx.read().clone();
        if let Some(sender) = sender {
            if sender.try_send(stored.clone()).is_err() {
                debug!(item_id = stored.id, "Sync queue saturated; item awaits the retry sweep");
            }
        }
        Ok(stored)
    }

    /// Capture a failed remote side-effect as a retryable work item
    async fn queue_for_retry(
        &self,
        entity_type: &str,
        entity_id: String,
        operation: &str,
        destination: &str,
        error: String,
        payload: Value,
    ) {
        let item = NewSyncQueueItem {
            entity_type: entity_type.to_string(),
            entity_id,
            operation: operation.to_string(),
            source: sources::RENTFLOW.to_string(),
            destination: destination.to_string(),
            payload,
            priority: SIDE_EFFECT_PRIORITY,
            status: SyncItemStatus::Failed,
            max_retries: self.retry_policy.config().max_retries as i32,
            last_error: Some(error),
            scheduled_at: Utc::now() + ChronoDuration::minutes(SIDE_EFFECT_RETRY_DELAY_MINUTES),
        };
        if let Err(err) = self.storage.insert_sync_item(item).await {
            error!(operation = %operation, error = %err,
                "❌ Failed to capture side-effect failure for retry");
        }
    }

    async fn event_queue_consumer(self, mut rx: mpsc::Receiver<NewIntegrationEvent>) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match self.storage.insert_integration_event(event).await {
                        Ok(stored) => {
                            debug!(event_id = stored.id, event_type = %stored.event_type,
                                "Processing integration event");
                            if let Err(err) =
                                self.storage.mark_integration_event_processed(stored.id).await
                            {
                                warn!(event_id = stored.id, error = %err,
                                    "Failed to mark event processed");
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "❌ Failed to persist integration event");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("event queue consumer exited");
    }

    async fn sync_queue_consumer(self, mut rx: mpsc::Receiver<SyncQueueItem>) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        loop {
            tokio::select! {
                item = rx.recv() => {
                    let Some(mut item) = item else { break };
                    match self.process_sync_item(&item).await {
                        SyncAttempt::Completed(_) => item.mark_completed(),
                        SyncAttempt::Transient(err) => item.increment_retry(err),
                        SyncAttempt::Permanent(err) => item.mark_permanently_failed(err),
                        SyncAttempt::Cancelled => break,
                    }
                    if let Err(err) = self.storage.update_sync_item(&item).await {
                        error!(item_id = item.id, error = %err, "❌ Failed to update sync item");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("sync queue consumer exited");
    }

    async fn reconciliation_loop(self) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        let mut ticker = tokio::time::interval(self.config.reconciliation.interval());
        ticker.tick().await; // discard the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.lifecycle.state() != LifecycleState::Running {
                        break;
                    }
                    let _unresolved = reconciliation::reconcile(&self.storage).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("reconciliation loop exited");
    }

    // --- Sync item execution ---------------------------------------------

    async fn process_sync_item(&self, item: &SyncQueueItem) -> SyncAttempt {
        match (item.entity_type.as_str(), item.operation.as_str()) {
            ("lead", operations::CREATE_CRM_LEAD) => self.sync_create_crm_lead(item).await,
            ("lead", operations::SYNC_SCORE) => self.sync_score_to_crm(item).await,
            ("booking", operations::SCHEDULE_SHOWING) => self.sync_schedule_showing(item).await,
            (_, operations::CREATE_LEDGER_TENANT) => self.sync_create_ledger_tenant(item).await,
            (entity_type, operation) => {
                warn!(entity_type = %entity_type, operation = %operation,
                    "Unknown sync operation; completing to avoid a poison loop");
                SyncAttempt::Completed(RemoteResponse::ok(json!({"skipped": true})))
            }
        }
    }

    async fn sync_create_crm_lead(&self, item: &SyncQueueItem) -> SyncAttempt {
        let Some(crm) = self.crm.clone() else {
            return SyncAttempt::Permanent("CRM client not configured".to_string());
        };
        let lead = match self.lookup_lead_by_entity_id(&item.entity_id).await {
            Ok(lead) => lead,
            Err(attempt) => return attempt,
        };

        let shutdown = self.lifecycle.shutdown_signal();
        let result = self
            .retry_policy
            .execute(shutdown, || {
                let crm = crm.clone();
                let lead = lead.clone();
                async move { crm.create_lead(&lead).await }
            })
            .await;

        let attempt = classify_remote(result);
        if let SyncAttempt::Completed(response) = &attempt {
            self.record_crm_contact_id(lead.id, response).await;
        }
        attempt
    }

    async fn sync_score_to_crm(&self, item: &SyncQueueItem) -> SyncAttempt {
        let Some(crm) = self.crm.clone() else {
            return SyncAttempt::Permanent("CRM client not configured".to_string());
        };
        let lead = match self.lookup_lead_by_entity_id(&item.entity_id).await {
            Ok(lead) => lead,
            Err(attempt) => return attempt,
        };
        let Some(crm_contact_id) = lead.crm_contact_id.clone() else {
            return SyncAttempt::Permanent(format!("lead {} has no CRM contact", lead.id));
        };
        let score = match self.storage.behavioral_score(lead.id).await {
            Ok(Some(score)) => score,
            Ok(None) => return SyncAttempt::Permanent(format!("lead {} has no score", lead.id)),
            Err(err) => return SyncAttempt::Transient(err.to_string()),
        };

        let shutdown = self.lifecycle.shutdown_signal();
        let result = self
            .retry_policy
            .execute(shutdown, || {
                let crm = crm.clone();
                let crm_contact_id = crm_contact_id.clone();
                let score = score.clone();
                async move { crm.sync_score(&crm_contact_id, &score).await }
            })
            .await;
        classify_remote(result)
    }

    async fn sync_schedule_showing(&self, item: &SyncQueueItem) -> SyncAttempt {
        let Some(crm) = self.crm.clone() else {
            return SyncAttempt::Permanent("CRM client not configured".to_string());
        };
        let Some(crm_contact_id) = item
            .payload
            .get("crm_contact_id")
            .and_then(Value::as_str)
            .map(String::from)
        else {
            return SyncAttempt::Permanent("payload missing crm_contact_id".to_string());
        };
        let Some(property_id) = item.payload.get("property_id").and_then(Value::as_i64) else {
            return SyncAttempt::Permanent("payload missing property_id".to_string());
        };
        let showing_at = item
            .payload
            .get("showing_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));
        let Some(showing_at) = showing_at else {
            return SyncAttempt::Permanent("payload missing showing_at".to_string());
        };

        let shutdown = self.lifecycle.shutdown_signal();
        let result = self
            .retry_policy
            .execute(shutdown, || {
                let crm = crm.clone();
                let crm_contact_id = crm_contact_id.clone();
                async move { crm.schedule_showing(&crm_contact_id, property_id, showing_at).await }
            })
            .await;
        classify_remote(result)
    }

    async fn sync_create_ledger_tenant(&self, item: &SyncQueueItem) -> SyncAttempt {
        let Some(ledger) = self.ledger.clone() else {
            return SyncAttempt::Permanent("ledger client not configured".to_string());
        };
        let Some(lead_id) = item.payload.get("lead_id").and_then(Value::as_i64) else {
            return SyncAttempt::Permanent("payload missing lead_id".to_string());
        };
        let Some(property_id) = item.payload.get("property_id").and_then(Value::as_i64) else {
            return SyncAttempt::Permanent("payload missing property_id".to_string());
        };

        let lead = match self.storage.lead(lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => return SyncAttempt::Permanent(format!("lead {lead_id} not found")),
            Err(err) => return SyncAttempt::Transient(err.to_string()),
        };
        let property = match self.storage.property(property_id).await {
            Ok(Some(property)) => property,
            Ok(None) => {
                return SyncAttempt::Permanent(format!("property {property_id} not found"))
            }
            Err(err) => return SyncAttempt::Transient(err.to_string()),
        };

        let shutdown = self.lifecycle.shutdown_signal();
        let result = self
            .retry_policy
            .execute(shutdown, || {
                let ledger = ledger.clone();
                let lead = lead.clone();
                let property = property.clone();
                async move { ledger.create_tenant(&lead, &property).await }
            })
            .await;
        classify_remote(result)
    }

    async fn lookup_lead_by_entity_id(
        &self,
        entity_id: &str,
    ) -> std::result::Result<Lead, SyncAttempt> {
        let lead_id: i64 = entity_id
            .parse()
            .map_err(|_| SyncAttempt::Permanent(format!("invalid lead id {entity_id}")))?;
        match self.storage.lead(lead_id).await {
            Ok(Some(lead)) => Ok(lead),
            Ok(None) => Err(SyncAttempt::Permanent(format!("lead {lead_id} not found"))),
            Err(err) => Err(SyncAttempt::Transient(err.to_string())),
        }
    }

    async fn record_crm_contact_id(&self, lead_id: i64, response: &RemoteResponse) {
        let crm_id = response
            .body
            .get("id")
            .and_then(|id| {
                id.as_str()
                    .map(String::from)
                    .or_else(|| id.as_i64().map(|n| n.to_string()))
            });
        if let Some(crm_id) = crm_id {
            if let Err(err) = self.storage.set_lead_crm_contact(lead_id, &crm_id).await {
                warn!(lead_id = lead_id, error = %err, "Failed to record CRM contact id");
            }
        }
    }

    // --- Full sync --------------------------------------------------------

    /// Run the full three-way sync: the ledger sub-syncs in parallel, then
    /// the CRM score sync, then reconciliation. Always returns a report;
    /// the status reflects exactly which subsystems made progress.
    pub async fn run_full_sync(&self) -> Result<SyncReport> {
        info!("🔄 Starting full three-way integration sync");

        let mut report = SyncReport::begin("full", "orchestrator");
        match self.storage.insert_sync_report(&report).await {
            Ok(stored) => report = stored,
            Err(err) => warn!(error = %err, "⚠️ Failed to create sync report row"),
        }

        if let Some(ledger) = self.ledger.clone() {
            let properties = tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.sync_properties().await }
            });
            let tenants = tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.sync_tenants().await }
            });
            let maintenance = tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.sync_maintenance().await }
            });

            let (properties, tenants, maintenance) =
                tokio::join!(properties, tenants, maintenance);
            let now = Utc::now();

            match flatten_join(properties) {
                Ok(outcome) => {
                    report.properties_synced = outcome.synced;
                    report.vacancies_updated = outcome.vacancies_updated;
                    report.errors.extend(outcome.errors);
                    self.last_sync.write().ledger_property = Some(now);
                }
                Err(message) => {
                    report.errors.push(SyncError::new(
                        "property_sync",
                        "",
                        "ledger_sync",
                        message,
                        true,
                    ));
                }
            }

            match flatten_join(tenants) {
                Ok(outcome) => {
                    report.tenants_synced = outcome.synced;
                    report.errors.extend(outcome.errors);
                    self.last_sync.write().ledger_tenant = Some(now);
                }
                Err(message) => {
                    report.errors.push(SyncError::new(
                        "tenant_sync",
                        "",
                        "ledger_sync",
                        message,
                        true,
                    ));
                }
            }

            match flatten_join(maintenance) {
                Ok(outcome) => {
                    report.maintenance_synced = outcome.synced;
                    report.errors.extend(outcome.errors);
                    self.last_sync.write().ledger_maintenance = Some(now);
                }
                Err(message) => {
                    report.errors.push(SyncError::new(
                        "maintenance_sync",
                        "",
                        "ledger_sync",
                        message,
                        true,
                    ));
                }
            }
        }

        let lead_outcome = self.sync_lead_scores().await;
        report.leads_synced = lead_outcome.synced;
        report.errors.extend(lead_outcome.errors);
        self.last_sync.write().crm = Some(Utc::now());

        report.errors.extend(reconciliation::reconcile(&self.storage).await);

        {
            let last_sync = self.last_sync.read();
            report.crm_last_sync = last_sync.crm;
            report.ledger_last_sync = last_sync.ledger_property;
        }
        report.finalize();

        if let Err(err) = self.storage.update_sync_report(&report).await {
            warn!(error = %err, "⚠️ Failed to persist sync report");
        }
        self.last_sync.write().full_sync = Some(Utc::now());

        info!(
            properties = report.properties_synced,
            tenants = report.tenants_synced,
            leads = report.leads_synced,
            maintenance = report.maintenance_synced,
            errors = report.error_count,
            status = %report.status,
            duration_seconds = report.duration_seconds,
            "🔄 Full sync complete"
        );
        Ok(report)
    }

    /// Push recent behavioral scores to the CRM, one lead at a time
    async fn sync_lead_scores(&self) -> LeadSyncOutcome {
        let mut outcome = LeadSyncOutcome::default();
        let Some(crm) = self.crm.clone() else {
            return outcome;
        };

        let since = Utc::now() - ChronoDuration::hours(LEAD_SYNC_WINDOW_HOURS);
        let leads = match self.storage.crm_linked_leads_updated_since(since).await {
            Ok(leads) => leads,
            Err(err) => {
                outcome.errors.push(SyncError::new(
                    "lead",
                    "",
                    "sync_score",
                    err.to_string(),
                    true,
                ));
                return outcome;
            }
        };

        for lead in leads {
            let Some(crm_contact_id) = lead.crm_contact_id.clone() else {
                continue;
            };
            let score = match self.storage.behavioral_score(lead.id).await {
                Ok(Some(score)) => score,
                Ok(None) => continue,
                Err(err) => {
                    outcome.errors.push(SyncError::new(
                        "lead",
                        lead.id.to_string(),
                        "sync_score",
                        err.to_string(),
                        true,
                    ));
                    continue;
                }
            };

            let shutdown = self.lifecycle.shutdown_signal();
            let result = self
                .retry_policy
                .execute(shutdown, || {
                    let crm = crm.clone();
                    let crm_contact_id = crm_contact_id.clone();
                    let score = score.clone();
                    async move { crm.sync_score(&crm_contact_id, &score).await }
                })
                .await;

            match classify_remote(result) {
                SyncAttempt::Completed(_) => outcome.synced += 1,
                SyncAttempt::Permanent(message) => {
                    outcome.errors.push(SyncError::new(
                        "lead",
                        lead.id.to_string(),
                        "sync_score",
                        message,
                        false,
                    ));
                }
                SyncAttempt::Transient(message) => {
                    outcome.errors.push(SyncError::new(
                        "lead",
                        lead.id.to_string(),
                        "sync_score",
                        message,
                        true,
                    ));
                }
                SyncAttempt::Cancelled => {
                    outcome.errors.push(SyncError::new(
                        "lead",
                        lead.id.to_string(),
                        "sync_score",
                        "cancelled by shutdown",
                        true,
                    ));
                    break;
                }
            }
        }

        outcome
    }

    /// Manual entry point: sync properties from the ledger
    pub async fn sync_properties_from_ledger(
        &self,
    ) -> Result<crate::models::PropertySyncOutcome> {
        let ledger = self.ledger.clone().ok_or_else(|| {
            CoreError::Configuration("ledger client not configured".to_string())
        })?;
        let outcome = ledger
            .sync_properties()
            .await
            .map_err(|err| CoreError::Remote(err.to_string()))?;
        self.last_sync.write().ledger_property = Some(Utc::now());
        Ok(outcome)
    }

    /// Manual entry point: sync maintenance from the ledger
    pub async fn sync_maintenance_from_ledger(
        &self,
    ) -> Result<crate::models::MaintenanceSyncOutcome> {
        let ledger = self.ledger.clone().ok_or_else(|| {
            CoreError::Configuration("ledger client not configured".to_string())
        })?;
        let outcome = ledger
            .sync_maintenance()
            .await
            .map_err(|err| CoreError::Remote(err.to_string()))?;
        self.last_sync.write().ledger_maintenance = Some(Utc::now());
        Ok(outcome)
    }

    /// Manual entry point: push recent scores to the CRM
    pub async fn sync_leads_with_crm(&self) -> Result<LeadSyncOutcome> {
        let outcome = self.sync_lead_scores().await;
        self.last_sync.write().crm = Some(Utc::now());
        Ok(outcome)
    }

    // --- Retry sweep ------------------------------------------------------

    /// Re-attempt failed sync items with retry budget remaining, ordered by
    /// priority then age, in one bounded batch. Exhausted items are never
    /// selected; they require operator action.
    pub async fn retry_failed_syncs(&self) -> Result<SyncReport> {
        info!("🔄 Retrying failed sync items");

        let items = self.storage.retryable_sync_items(RETRY_SWEEP_BATCH).await?;
        let mut report = SyncReport::begin("retry", "orchestrator");
        let mut completed = 0;

        for mut item in items {
            match self.process_sync_item(&item).await {
                SyncAttempt::Completed(_) => {
                    item.mark_completed();
                    completed += 1;
                }
                SyncAttempt::Transient(err) => {
                    item.increment_retry(err.clone());
                    report.errors.push(SyncError::new(
                        item.entity_type.clone(),
                        item.entity_id.clone(),
                        item.operation.clone(),
                        err,
                        item.status == SyncItemStatus::Failed,
                    ));
                }
                SyncAttempt::Permanent(err) => {
                    item.mark_permanently_failed(err.clone());
                    report.errors.push(SyncError::new(
                        item.entity_type.clone(),
                        item.entity_id.clone(),
                        item.operation.clone(),
                        err,
                        false,
                    ));
                }
                SyncAttempt::Cancelled => break,
            }
            if let Err(err) = self.storage.update_sync_item(&item).await {
                error!(item_id = item.id, error = %err, "❌ Failed to update sync item");
            }
        }

        let now = Utc::now();
        report.completed_at = Some(now);
        report.duration_seconds = (now - report.started_at).num_milliseconds() as f64 / 1000.0;
        report.error_count = report.errors.len() as i32;
        report.status = if report.errors.is_empty() {
            SyncStatus::Success
        } else if completed > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        };

        if let Err(err) = self.storage.insert_sync_report(&report).await {
            warn!(error = %err, "⚠️ Failed to persist retry report");
        }
        Ok(report)
    }

    // --- State-transition handlers ---------------------------------------

    /// A lead entered the system: track the fact, score it, mirror it to
    /// the CRM in the background, and record the integration event.
    pub async fn handle_new_lead(&self, lead: Lead) -> Result<()> {
        info!(lead_id = lead.id, name = %lead.full_name(), "🆕 Processing new lead");

        self.tracker
            .track_event(
                lead.id,
                behavior::LEAD_CREATED,
                json!({"source": lead.source, "email": lead.email}),
                None,
            )
            .await?;

        if let Some(crm) = self.crm.clone() {
            if lead.crm_contact_id.as_deref().unwrap_or("").is_empty() {
                let orchestrator = self.clone();
                let lead = lead.clone();
                tokio::spawn(async move {
                    let shutdown = orchestrator.lifecycle.shutdown_signal();
                    let result = orchestrator
                        .retry_policy
                        .execute(shutdown, || {
                            let crm = crm.clone();
                            let lead = lead.clone();
                            async move { crm.create_lead(&lead).await }
                        })
                        .await;
                    match classify_remote(result) {
                        SyncAttempt::Completed(response) => {
                            orchestrator.record_crm_contact_id(lead.id, &response).await;
                        }
                        SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) => {
                            warn!(lead_id = lead.id, error = %err,
                                "⚠️ Failed to create lead in CRM; queued for retry");
                            orchestrator
                                .queue_for_retry(
                                    "lead",
                                    lead.id.to_string(),
                                    operations::CREATE_CRM_LEAD,
                                    sources::CRM,
                                    err,
                                    json!({}),
                                )
                                .await;
                        }
                        SyncAttempt::Cancelled => {
                            debug!(lead_id = lead.id, "CRM lead creation cancelled by shutdown");
                        }
                    }
                });
            }
        }

        self.emit_event(NewIntegrationEvent::new(
            events::NEW_LEAD,
            sources::RENTFLOW,
            "lead",
            lead.id.to_string(),
            json!({
                "first_name": lead.first_name,
                "last_name": lead.last_name,
                "email": lead.email,
                "source": lead.source,
            }),
        ))
        .await
    }

    /// A showing was booked: track it against the lead and mirror the
    /// appointment into the CRM in the background.
    pub async fn handle_booking_created(&self, booking: Booking) -> Result<()> {
        info!(booking = %booking.reference, property_id = booking.property_id,
            "📅 Processing new booking");

        let lead = match booking.crm_contact_id.as_deref() {
            Some(crm_contact_id) => self.storage.lead_by_crm_contact(crm_contact_id).await?,
            None => None,
        };

        if let Some(lead) = &lead {
            self.tracker
                .track_event(
                    lead.id,
                    behavior::SCHEDULED,
                    json!({
                        "booking_id": booking.id,
                        "showing_at": booking.showing_at.to_rfc3339(),
                    }),
                    Some(booking.property_id),
                )
                .await?;
        }

        if let (Some(crm), Some(crm_contact_id)) =
            (self.crm.clone(), booking.crm_contact_id.clone())
        {
            let orchestrator = self.clone();
            let booking_clone = booking.clone();
            tokio::spawn(async move {
                let shutdown = orchestrator.lifecycle.shutdown_signal();
                let result = orchestrator
                    .retry_policy
                    .execute(shutdown, || {
                        let crm = crm.clone();
                        let crm_contact_id = crm_contact_id.clone();
                        let booking = booking_clone.clone();
                        async move {
                            crm.schedule_showing(
                                &crm_contact_id,
                                booking.property_id,
                                booking.showing_at,
                            )
                            .await
                        }
                    })
                    .await;
                match classify_remote(result) {
                    SyncAttempt::Completed(_) => {}
                    SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) => {
                        warn!(booking_id = booking_clone.id, error = %err,
                            "⚠️ Failed to sync booking to CRM; queued for retry");
                        orchestrator
                            .queue_for_retry(
                                "booking",
                                booking_clone.id.to_string(),
                                operations::SCHEDULE_SHOWING,
                                sources::CRM,
                                err,
                                json!({
                                    "crm_contact_id": crm_contact_id,
                                    "property_id": booking_clone.property_id,
                                    "showing_at": booking_clone.showing_at.to_rfc3339(),
                                }),
                            )
                            .await;
                    }
                    SyncAttempt::Cancelled => {}
                }
            });
        }

        self.emit_event(NewIntegrationEvent::new(
            events::BOOKING_CREATED,
            sources::RENTFLOW,
            "booking",
            booking.id.to_string(),
            json!({
                "property_id": booking.property_id,
                "crm_contact_id": booking.crm_contact_id,
                "showing_at": booking.showing_at.to_rfc3339(),
            }),
        ))
        .await
    }

    /// A booking converted to a lease: flip the property to occupied,
    /// create the tenant in the ledger, and update the CRM.
    pub async fn handle_lease_conversion(&self, booking: Booking) -> Result<()> {
        info!(booking = %booking.reference, "🎉 Processing lease conversion");

        let lead = match booking.crm_contact_id.as_deref() {
            Some(crm_contact_id) => self.storage.lead_by_crm_contact(crm_contact_id).await?,
            None => None,
        };
        if lead.is_none() {
            warn!(booking = %booking.reference, "Lead not found for lease conversion");
        }

        if let Some(lead) = &lead {
            self.tracker
                .track_event(
                    lead.id,
                    behavior::CONVERTED,
                    json!({"conversion_type": "lease", "property_id": booking.property_id}),
                    Some(booking.property_id),
                )
                .await?;
        }

        self.storage
            .set_property_occupancy(
                booking.property_id,
                "occupied",
                "lease_conversion",
                false,
                false,
            )
            .await?;

        if let (Some(_), Some(lead)) = (self.ledger.clone(), lead.clone()) {
            let orchestrator = self.clone();
            let booking_id = booking.id;
            let property_id = booking.property_id;
            tokio::spawn(async move {
                let item = fabricate_tenant_item(booking_id, lead.id, property_id);
                match orchestrator.process_sync_item(&item).await {
                    SyncAttempt::Completed(_) => {
                        info!(booking_id = booking_id, "✅ Created tenant in ledger");
                    }
                    SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) => {
                        warn!(booking_id = booking_id, error = %err,
                            "⚠️ Failed to create tenant in ledger; queued for retry");
                        orchestrator
                            .queue_for_retry(
                                "lease_conversion",
                                booking_id.to_string(),
                                operations::CREATE_LEDGER_TENANT,
                                sources::LEDGER,
                                err,
                                json!({"lead_id": lead.id, "property_id": property_id}),
                            )
                            .await;
                    }
                    SyncAttempt::Cancelled => {}
                }
            });
        }

        if let (Some(crm), Some(lead)) = (self.crm.clone(), lead.clone()) {
            if let Some(crm_contact_id) = lead.crm_contact_id.clone() {
                let orchestrator = self.clone();
                let address = booking.property_address.clone();
                tokio::spawn(async move {
                    let shutdown = orchestrator.lifecycle.shutdown_signal();
                    let status_result = orchestrator
                        .retry_policy
                        .execute(shutdown.clone(), || {
                            let crm = crm.clone();
                            let crm_contact_id = crm_contact_id.clone();
                            async move { crm.update_lead_status(&crm_contact_id, "Tenant").await }
                        })
                        .await;
                    if let SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) =
                        classify_remote(status_result)
                    {
                        warn!(error = %err, "⚠️ Failed to update lead status in CRM");
                    }

                    let note = format!("Lease conversion completed. Property: {address}");
                    let note_result = orchestrator
                        .retry_policy
                        .execute(shutdown, || {
                            let crm = crm.clone();
                            let crm_contact_id = crm_contact_id.clone();
                            let note = note.clone();
                            async move { crm.add_note(&crm_contact_id, &note).await }
                        })
                        .await;
                    if let SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) =
                        classify_remote(note_result)
                    {
                        warn!(error = %err, "⚠️ Failed to add conversion note to CRM");
                    }
                });
            }
        }

        self.emit_event(NewIntegrationEvent::new(
            events::LEASE_CONVERSION,
            sources::RENTFLOW,
            "booking",
            booking.id.to_string(),
            json!({
                "property_id": booking.property_id,
                "crm_contact_id": booking.crm_contact_id,
            }),
        ))
        .await
    }

    /// A maintenance ticket arrived from the ledger: raise alerts and
    /// record the integration event.
    pub async fn handle_maintenance_request(&self, ticket: MaintenanceTicket) -> Result<()> {
        info!(ticket = %ticket.ledger_id, category = %ticket.category,
            priority = %ticket.priority, "🔧 Processing maintenance request");

        if ticket.is_emergency {
            if let Err(err) = self
                .notifier
                .agent_alert(
                    "admin",
                    "Emergency Maintenance",
                    &format!(
                        "🚨 {} at property {} - {}",
                        ticket.category, ticket.property_id, ticket.description
                    ),
                    json!({"property_id": ticket.property_id, "is_emergency": true}),
                )
                .await
            {
                warn!(error = %err, "Emergency alert failed");
            }
        }

        if let Ok(Some(property)) = self.storage.property_by_ledger_id(&ticket.property_id).await
        {
            if let Err(err) = self
                .notifier
                .agent_alert(
                    "owner",
                    "Maintenance Request",
                    &format!(
                        "{} ({} priority) at {} - {}",
                        ticket.category, ticket.priority, property.address, ticket.description
                    ),
                    json!({"property_id": property.ledger_id, "priority": ticket.priority}),
                )
                .await
            {
                warn!(error = %err, "Owner alert failed");
            }
        }

        self.emit_event(NewIntegrationEvent::new(
            events::MAINTENANCE_CREATED,
            sources::LEDGER,
            "maintenance",
            ticket.ledger_id.clone(),
            json!({
                "property_id": ticket.property_id,
                "category": ticket.category,
                "priority": ticket.priority,
                "is_emergency": ticket.is_emergency,
            }),
        ))
        .await
    }

    /// The ledger reported a vacancy: flip the local flags and tell
    /// interested leads in the background.
    pub async fn handle_property_vacancy(&self, ledger_property_id: &str) -> Result<()> {
        info!(property = %ledger_property_id, "🏠 Processing property vacancy");

        self.storage
            .set_property_occupancy_by_ledger_id(
                ledger_property_id,
                "vacant",
                sources::LEDGER,
                true,
                true,
            )
            .await?;

        if let (Some(crm), Ok(Some(property))) = (
            self.crm.clone(),
            self.storage.property_by_ledger_id(ledger_property_id).await,
        ) {
            let orchestrator = self.clone();
            tokio::spawn(async move {
                let viewers = match orchestrator
                    .storage
                    .leads_who_viewed_property(property.id, 50)
                    .await
                {
                    Ok(viewers) => viewers,
                    Err(err) => {
                        warn!(error = %err, "Vacancy match query failed");
                        return;
                    }
                };

                let note = format!(
                    "New vacancy alert! Property at {} is now available. This matches your search criteria.",
                    property.address
                );
                let mut notified = 0;
                for viewer in viewers {
                    let Some(crm_contact_id) = viewer.crm_contact_id.clone() else {
                        continue;
                    };
                    let shutdown = orchestrator.lifecycle.shutdown_signal();
                    let result = orchestrator
                        .retry_policy
                        .execute(shutdown, || {
                            let crm = crm.clone();
                            let crm_contact_id = crm_contact_id.clone();
                            let note = note.clone();
                            async move { crm.add_note(&crm_contact_id, &note).await }
                        })
                        .await;
                    match classify_remote(result) {
                        SyncAttempt::Completed(_) => notified += 1,
                        SyncAttempt::Cancelled => break,
                        SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) => {
                            debug!(lead_id = viewer.id, error = %err, "Vacancy note failed");
                        }
                    }
                }
                info!(notified = notified, address = %property.address,
                    "📧 Notified leads about vacancy");
            });
        }

        self.emit_event(NewIntegrationEvent::new(
            events::PROPERTY_VACANCY,
            sources::LEDGER,
            "property",
            ledger_property_id.to_string(),
            json!({"status": "vacant"}),
        ))
        .await
    }

    /// An application was approved: create the tenant in the ledger and
    /// update the CRM, both in the background.
    pub async fn handle_application_approved(&self, lead: &Lead, property_id: i64) -> Result<()> {
        info!(lead_id = lead.id, property_id = property_id,
            "✅ Processing approved application");

        let property = self
            .storage
            .property(property_id)
            .await?
            .ok_or_else(|| {
                CoreError::Orchestration(format!("property {property_id} not found"))
            })?;

        self.tracker
            .track_event(
                lead.id,
                events::APPLICATION_APPROVED,
                json!({"property_id": property_id}),
                Some(property_id),
            )
            .await?;

        if self.ledger.is_some() {
            let orchestrator = self.clone();
            let lead_id = lead.id;
            tokio::spawn(async move {
                let item = fabricate_tenant_item(lead_id, lead_id, property_id);
                match orchestrator.process_sync_item(&item).await {
                    SyncAttempt::Completed(_) => {
                        info!(lead_id = lead_id, "✅ Created tenant in ledger");
                    }
                    SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) => {
                        warn!(lead_id = lead_id, error = %err,
                            "⚠️ Failed to create tenant in ledger; queued for retry");
                        orchestrator
                            .queue_for_retry(
                                "application",
                                lead_id.to_string(),
                                operations::CREATE_LEDGER_TENANT,
                                sources::LEDGER,
                                err,
                                json!({"lead_id": lead_id, "property_id": property_id}),
                            )
                            .await;
                    }
                    SyncAttempt::Cancelled => {}
                }
            });
        }

        if let (Some(crm), Some(crm_contact_id)) =
            (self.crm.clone(), lead.crm_contact_id.clone())
        {
            let orchestrator = self.clone();
            let address = property.address.clone();
            tokio::spawn(async move {
                let shutdown = orchestrator.lifecycle.shutdown_signal();
                let status_result = orchestrator
                    .retry_policy
                    .execute(shutdown.clone(), || {
                        let crm = crm.clone();
                        let crm_contact_id = crm_contact_id.clone();
                        async move {
                            crm.update_lead_status(&crm_contact_id, "Application Approved")
                                .await
                        }
                    })
                    .await;
                if let SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) =
                    classify_remote(status_result)
                {
                    warn!(error = %err, "⚠️ Failed to update CRM status");
                }

                let note = format!("Application approved for property: {address}");
                let note_result = orchestrator
                    .retry_policy
                    .execute(shutdown, || {
                        let crm = crm.clone();
                        let crm_contact_id = crm_contact_id.clone();
                        let note = note.clone();
                        async move { crm.add_note(&crm_contact_id, &note).await }
                    })
                    .await;
                if let SyncAttempt::Permanent(err) | SyncAttempt::Transient(err) =
                    classify_remote(note_result)
                {
                    warn!(error = %err, "⚠️ Failed to add approval note to CRM");
                }
            });
        }

        self.emit_event(NewIntegrationEvent::new(
            events::APPLICATION_APPROVED,
            sources::RENTFLOW,
            "lead",
            lead.id.to_string(),
            json!({"property_id": property_id}),
        ))
        .await
    }

    // --- Webhooks ---------------------------------------------------------

    /// Persist the raw webhook event, then dispatch to a source-specific
    /// handler. Unknown sources and types are logged no-ops, not errors.
    pub async fn handle_webhook(
        &self,
        source: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<()> {
        let event_type = if event_type.is_empty() {
            extract_event_type(&payload).unwrap_or_default().to_string()
        } else {
            event_type.to_string()
        };
        info!(source = %source, event_type = %event_type, "📥 Processing webhook");

        // Durability before processing: the raw event is stored even if
        // the dispatch below fails or matches nothing. Webhooks carry no
        // natural entity identity, so each delivery gets its own.
        self.storage
            .insert_integration_event(NewIntegrationEvent::new(
                event_type.clone(),
                source,
                "webhook",
                uuid::Uuid::new_v4().to_string(),
                payload.clone(),
            ))
            .await?;

        match source {
            sources::CRM => self.handle_crm_webhook(&event_type, &payload).await,
            sources::LEDGER => self.handle_ledger_webhook(&event_type, &payload).await,
            _ => {
                info!(source = %source, "Webhook from unknown source ignored");
                Ok(())
            }
        }
    }

    async fn handle_crm_webhook(&self, event_type: &str, payload: &Value) -> Result<()> {
        let crm_contact_id = payload
            .get("crm_contact_id")
            .or_else(|| payload.get("contact_id"))
            .or_else(|| payload.get("person_id"))
            .and_then(Value::as_str);

        let Some(crm_contact_id) = crm_contact_id else {
            debug!(event_type = %event_type, "CRM webhook without contact id ignored");
            return Ok(());
        };
        let Some(lead) = self.storage.lead_by_crm_contact(crm_contact_id).await? else {
            debug!(crm_contact_id = %crm_contact_id, "CRM webhook for unknown lead ignored");
            return Ok(());
        };

        let behavioral_type = match event_type {
            "email_opened" => Some(behavior::EMAIL_OPENED),
            "email_clicked" => Some(behavior::EMAIL_CLICKED),
            "sms_replied" => Some(behavior::SMS_REPLIED),
            "call_logged" => Some(behavior::CALLED),
            _ => None,
        };

        match behavioral_type {
            Some(behavioral_type) => {
                self.tracker
                    .track_event(lead.id, behavioral_type, payload.clone(), None)
                    .await?;
                Ok(())
            }
            None => {
                debug!(event_type = %event_type, "CRM webhook type has no behavioral mapping");
                Ok(())
            }
        }
    }

    async fn handle_ledger_webhook(&self, event_type: &str, payload: &Value) -> Result<()> {
        match event_type {
            "property.vacancy" | "tenant.moved_out" => {
                let Some(property_id) = payload.get("property_id").and_then(Value::as_str)
                else {
                    debug!("Ledger vacancy webhook without property_id ignored");
                    return Ok(());
                };
                self.handle_property_vacancy(property_id).await
            }
            other if other.starts_with("tenant.") || other.starts_with("maintenance.") => {
                // Mirrored by the periodic ledger sync passes; the raw
                // event is already durable
                debug!(event_type = %other, "Ledger webhook deferred to sync pass");
                Ok(())
            }
            other => {
                debug!(event_type = %other, "Unknown ledger webhook type ignored");
                Ok(())
            }
        }
    }

    // --- Reads ------------------------------------------------------------

    /// Aggregate the cross-system dashboard; failed sections degrade to
    /// their defaults
    pub async fn get_unified_dashboard(&self) -> UnifiedDashboard {
        let last_sync = self.last_sync.read().clone();
        dashboard::build_dashboard(
            &self.storage,
            last_sync,
            self.crm.is_some(),
            self.ledger.is_some(),
        )
        .await
    }

    pub async fn get_last_sync_report(&self) -> Result<Option<SyncReport>> {
        self.storage.latest_sync_report().await
    }

    pub async fn get_sync_history(&self, limit: i64) -> Result<Vec<SyncReport>> {
        self.storage.sync_report_history(limit).await
    }
}

/// Build the transient work item used to execute a tenant creation inline
/// from a handler before any queueing happened
fn fabricate_tenant_item(entity_id: i64, lead_id: i64, property_id: i64) -> SyncQueueItem {
    let now = Utc::now();
    SyncQueueItem {
        id: 0,
        entity_type: "lease_conversion".to_string(),
        entity_id: entity_id.to_string(),
        operation: operations::CREATE_LEDGER_TENANT.to_string(),
        source: sources::RENTFLOW.to_string(),
        destination: sources::LEDGER.to_string(),
        payload: json!({"lead_id": lead_id, "property_id": property_id}),
        priority: SIDE_EFFECT_PRIORITY,
        status: SyncItemStatus::Pending,
        retry_count: 0,
        max_retries: 0,
        last_error: None,
        scheduled_at: now,
        processed_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn flatten_join<T>(
    joined: std::result::Result<std::result::Result<T, RemoteError>, tokio::task::JoinError>,
) -> std::result::Result<T, String> {
    match joined {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(remote)) => Err(remote.to_string()),
        Err(join_error) => Err(format!("sync task panicked: {join_error}")),
    }
}

impl std::fmt::Debug for IntegrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationOrchestrator")
            .field("state", &self.lifecycle.state())
            .field("crm_configured", &self.crm.is_some())
            .field("ledger_configured", &self.ledger.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl TriggerSink for IntegrationOrchestrator {
    /// Record each canonical trigger as one durable integration event.
    /// Downstream campaign execution consumes these events elsewhere;
    /// handlers stay tolerant of out-of-order arrival by re-reading
    /// current state instead of trusting the payload.
    async fn handle_trigger(&self, trigger: CanonicalTrigger) -> Result<()> {
        let (entity_type, entity_id) = match &trigger {
            CanonicalTrigger::PriceDropped { property_id, .. } => {
                ("property", property_id.to_string())
            }
            CanonicalTrigger::LeadScoredHot { lead_id, .. } => ("lead", lead_id.to_string()),
            CanonicalTrigger::ShowingCompleted { booking_id, .. } => {
                ("booking", booking_id.to_string())
            }
        };

        self.emit_event(NewIntegrationEvent::new(
            trigger.trigger_type(),
            sources::RENTFLOW,
            entity_type,
            entity_id,
            trigger.payload(),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use crate::storage::MemoryStorage;

    fn orchestrator_with(memory: Arc<MemoryStorage>) -> IntegrationOrchestrator {
        let storage: Arc<dyn Storage> = memory;
        let notifier = Arc::new(NullNotifier);
        let scoring = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
        let tracker = Arc::new(BehaviorTracker::new(
            storage.clone(),
            scoring.clone(),
            notifier.clone(),
        ));
        IntegrationOrchestrator::new(
            storage,
            None,
            None,
            scoring,
            tracker,
            notifier,
            RentflowConfig::default(),
        )
    }

    fn sample_event(n: i64) -> NewIntegrationEvent {
        NewIntegrationEvent::new(
            events::NEW_LEAD,
            sources::RENTFLOW,
            "lead",
            n.to_string(),
            json!({"n": n}),
        )
    }

    #[tokio::test]
    async fn test_emit_event_overflow_degrades_to_direct_persistence() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory.clone());

        // Install a capacity-1 queue with no consumer so the second emit
        // overflows
        let (tx, _rx) = mpsc::channel(1);
        *orchestrator.queues.event_tx.write() = Some(tx);

        orchestrator.emit_event(sample_event(1)).await.unwrap();
        orchestrator.emit_event(sample_event(2)).await.unwrap();

        // The overflowed event bypassed the queue but is durably readable
        let persisted = memory.integration_events();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].entity_id, "2");
    }

    #[tokio::test]
    async fn test_emit_event_persists_directly_when_not_running() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory.clone());

        orchestrator.emit_event(sample_event(7)).await.unwrap();
        assert_eq!(memory.integration_events().len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory);

        orchestrator.start();
        assert_eq!(orchestrator.state(), LifecycleState::Running);
        orchestrator.start();
        assert_eq!(orchestrator.state(), LifecycleState::Running);

        orchestrator.stop();
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        orchestrator.stop();
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_webhook_persists_before_dispatch_and_tolerates_unknowns() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory.clone());

        orchestrator
            .handle_webhook("carrier-pigeon", "wing_flap", json!({"x": 1}))
            .await
            .unwrap();

        let events = memory.integration_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "wing_flap");
        assert_eq!(events[0].source, "carrier-pigeon");
    }

    #[tokio::test]
    async fn test_webhook_event_type_fallback_chain() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory.clone());

        orchestrator
            .handle_webhook(sources::LEDGER, "", json!({"eventType": "tenant.updated"}))
            .await
            .unwrap();

        assert_eq!(memory.integration_events()[0].event_type, "tenant.updated");
    }

    #[test]
    fn test_extract_event_type_prefers_canonical_key() {
        assert_eq!(
            extract_event_type(&json!({"event_type": "a", "type": "b", "eventType": "c"})),
            Some("a")
        );
        assert_eq!(extract_event_type(&json!({"type": "b"})), Some("b"));
        assert_eq!(extract_event_type(&json!({"eventType": "c"})), Some("c"));
        assert_eq!(extract_event_type(&json!({"other": 1})), None);
    }

    #[tokio::test]
    async fn test_run_full_sync_without_clients_reports_success() {
        let memory = Arc::new(MemoryStorage::new());
        let orchestrator = orchestrator_with(memory.clone());

        let report = orchestrator.run_full_sync().await.unwrap();
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.error_count, 0);
        assert!(report.completed_at.is_some());
        // The report row is persisted and retrievable
        assert!(orchestrator.get_last_sync_report().await.unwrap().is_some());
    }
}
