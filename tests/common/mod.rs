//! Shared fixtures: mock external clients, a counting notifier, and a
//! wired orchestrator over in-memory storage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use rentflow_core::clients::{CrmClient, LedgerClient};
use rentflow_core::config::RentflowConfig;
use rentflow_core::error::Result;
use rentflow_core::models::{
    BehavioralScore, Lead, MaintenanceSyncOutcome, PropertyState, PropertySyncOutcome,
    TenantSyncOutcome,
};
use rentflow_core::notify::Notifier;
use rentflow_core::orchestration::IntegrationOrchestrator;
use rentflow_core::resilience::retry::{RemoteError, RemoteResponse};
use rentflow_core::scoring::{BehaviorTracker, ScoringEngine};
use rentflow_core::storage::{MemoryStorage, Storage};

/// How every mock CRM endpoint behaves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrmMode {
    Ok,
    /// Complete with this status (e.g. 400 for a permanent failure)
    Status(u16),
    /// Fail at the transport layer
    Transport,
}

/// Scriptable CRM double recording every call
pub struct MockCrm {
    pub mode: Mutex<CrmMode>,
    pub calls: Mutex<Vec<(String, String)>>,
    /// Optional per-call script consumed before `mode` applies
    pub script: Mutex<VecDeque<CrmMode>>,
}

impl Default for MockCrm {
    fn default() -> Self {
        Self {
            mode: Mutex::new(CrmMode::Ok),
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }
}

impl MockCrm {
    pub fn set_mode(&self, mode: CrmMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls_named(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    fn respond(
        &self,
        method: &str,
        target: &str,
    ) -> std::result::Result<RemoteResponse, RemoteError> {
        self.calls
            .lock()
            .push((method.to_string(), target.to_string()));
        let mode = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.mode.lock());
        match mode {
            CrmMode::Ok => Ok(RemoteResponse::ok(json!({"id": "crm-new-1"}))),
            CrmMode::Status(status) => Ok(RemoteResponse::with_status(status, json!({}))),
            CrmMode::Transport => Err(RemoteError::Transport("connection refused".to_string())),
        }
    }
}

#[async_trait]
impl CrmClient for MockCrm {
    async fn create_lead(&self, lead: &Lead) -> std::result::Result<RemoteResponse, RemoteError> {
        self.respond("create_lead", &lead.id.to_string())
    }

    async fn update_lead_status(
        &self,
        crm_contact_id: &str,
        status: &str,
    ) -> std::result::Result<RemoteResponse, RemoteError> {
        self.respond("update_lead_status", &format!("{crm_contact_id}:{status}"))
    }

    async fn add_note(
        &self,
        crm_contact_id: &str,
        _note: &str,
    ) -> std::result::Result<RemoteResponse, RemoteError> {
        self.respond("add_note", crm_contact_id)
    }

    async fn schedule_showing(
        &self,
        crm_contact_id: &str,
        _property_id: i64,
        _showing_at: DateTime<Utc>,
    ) -> std::result::Result<RemoteResponse, RemoteError> {
        self.respond("schedule_showing", crm_contact_id)
    }

    async fn sync_score(
        &self,
        crm_contact_id: &str,
        _score: &BehavioralScore,
    ) -> std::result::Result<RemoteResponse, RemoteError> {
        self.respond("sync_score", crm_contact_id)
    }
}

type LedgerResult<T> = std::result::Result<T, RemoteError>;

/// Scriptable ledger double with per-pass outcomes
pub struct MockLedger {
    pub properties: Mutex<LedgerResult<PropertySyncOutcome>>,
    pub tenants: Mutex<LedgerResult<TenantSyncOutcome>>,
    pub maintenance: Mutex<LedgerResult<MaintenanceSyncOutcome>>,
    pub tenant_creations: Mutex<Vec<i64>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            properties: Mutex::new(Ok(PropertySyncOutcome {
                synced: 4,
                vacancies_updated: 1,
                errors: Vec::new(),
            })),
            tenants: Mutex::new(Ok(TenantSyncOutcome {
                synced: 3,
                errors: Vec::new(),
            })),
            maintenance: Mutex::new(Ok(MaintenanceSyncOutcome {
                synced: 2,
                emergency_count: 0,
                errors: Vec::new(),
            })),
            tenant_creations: Mutex::new(Vec::new()),
        }
    }
}

impl MockLedger {
    pub fn fail_properties(&self, message: &str) {
        *self.properties.lock() = Err(RemoteError::Transport(message.to_string()));
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn sync_properties(&self) -> LedgerResult<PropertySyncOutcome> {
        self.properties.lock().clone()
    }

    async fn sync_tenants(&self) -> LedgerResult<TenantSyncOutcome> {
        self.tenants.lock().clone()
    }

    async fn sync_maintenance(&self) -> LedgerResult<MaintenanceSyncOutcome> {
        self.maintenance.lock().clone()
    }

    async fn create_tenant(
        &self,
        lead: &Lead,
        _property: &PropertyState,
    ) -> LedgerResult<RemoteResponse> {
        self.tenant_creations.lock().push(lead.id);
        Ok(RemoteResponse::ok(json!({"id": "tenant-1"})))
    }
}

/// Notifier that counts alerts instead of delivering them
#[derive(Default)]
pub struct CountingNotifier {
    pub hot_alerts: AtomicI32,
    pub spikes: AtomicI32,
    pub agent_alerts: AtomicI32,
}

impl CountingNotifier {
    pub fn hot_alert_count(&self) -> i32 {
        self.hot_alerts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn hot_lead_alert(
        &self,
        _lead_id: i64,
        _lead_name: &str,
        _composite_score: i32,
    ) -> Result<()> {
        self.hot_alerts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn engagement_spike(&self, _lead_id: i64, _delta: i32, _score: i32) -> Result<()> {
        self.spikes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn agent_alert(
        &self,
        _audience: &str,
        _title: &str,
        _body: &str,
        _meta: Value,
    ) -> Result<()> {
        self.agent_alerts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fully wired orchestrator over in-memory storage and mock clients
pub struct Harness {
    pub memory: Arc<MemoryStorage>,
    pub crm: Arc<MockCrm>,
    pub ledger: Arc<MockLedger>,
    pub notifier: Arc<CountingNotifier>,
    pub scoring: Arc<ScoringEngine>,
    pub tracker: Arc<BehaviorTracker>,
    pub orchestrator: IntegrationOrchestrator,
}

pub fn harness() -> Harness {
    let memory = Arc::new(MemoryStorage::new());
    let storage: Arc<dyn Storage> = memory.clone();
    let crm = Arc::new(MockCrm::default());
    let ledger = Arc::new(MockLedger::default());
    let notifier = Arc::new(CountingNotifier::default());

    let scoring = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
    let tracker = Arc::new(BehaviorTracker::new(
        storage.clone(),
        scoring.clone(),
        notifier.clone(),
    ));

    let orchestrator = IntegrationOrchestrator::new(
        storage,
        Some(crm.clone()),
        Some(ledger.clone()),
        scoring.clone(),
        tracker.clone(),
        notifier.clone(),
        fast_config(),
    );

    Harness {
        memory,
        crm,
        ledger,
        notifier,
        scoring,
        tracker,
        orchestrator,
    }
}

/// Default config with the retry delays shrunk so transient-failure paths
/// don't slow the suite down
pub fn fast_config() -> RentflowConfig {
    let mut config = RentflowConfig::default();
    config.retry.initial_delay_ms = 5;
    config.retry.max_delay_ms = 20;
    config
}

pub fn lead(id: i64, email: &str, crm_id: Option<&str>) -> Lead {
    let now = Utc::now();
    Lead {
        id,
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: email.to_string(),
        source: Some("website".to_string()),
        crm_contact_id: crm_id.map(String::from),
        created_at: now,
        updated_at: now,
    }
}

pub fn property(id: i64, ledger_id: &str) -> PropertyState {
    PropertyState {
        id,
        ledger_id: ledger_id.to_string(),
        address: format!("{id} Harbor Ave"),
        status: "vacant".to_string(),
        status_source: "ledger".to_string(),
        is_vacant: true,
        is_bookable: true,
        status_updated_at: Utc::now(),
    }
}

/// Poll until `check` passes or the deadline hits; for asserting on work
/// done by spawned background tasks
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}
