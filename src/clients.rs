//! # External System Clients
//!
//! Trait seams for the two external systems of record. Concrete REST
//! clients (auth, payload shapes, pagination) live outside this crate;
//! the orchestration core only depends on these contracts and on the
//! [`RemoteResponse`]/[`RemoteError`] transport types the retry primitive
//! understands.
//!
//! Sync passes against the ledger are pull-and-apply operations owned by
//! the client: the client fetches remote state and writes it through its
//! own storage handle, reporting counts and per-entity errors back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    BehavioralScore, Lead, MaintenanceSyncOutcome, PropertyState, PropertySyncOutcome,
    TenantSyncOutcome,
};
use crate::resilience::retry::{RemoteError, RemoteResponse};

/// The CRM holding lead/contact records, notes, and statuses
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Mirror a local lead into the CRM
    async fn create_lead(&self, lead: &Lead) -> Result<RemoteResponse, RemoteError>;

    /// Update the CRM-side status of a lead (e.g. "Tenant", "Application Approved")
    async fn update_lead_status(
        &self,
        crm_contact_id: &str,
        status: &str,
    ) -> Result<RemoteResponse, RemoteError>;

    /// Attach a free-form note to a CRM contact
    async fn add_note(&self, crm_contact_id: &str, note: &str)
        -> Result<RemoteResponse, RemoteError>;

    /// Record a scheduled showing against a CRM contact
    async fn schedule_showing(
        &self,
        crm_contact_id: &str,
        property_id: i64,
        showing_at: DateTime<Utc>,
    ) -> Result<RemoteResponse, RemoteError>;

    /// Push the current behavioral score to the CRM contact record
    async fn sync_score(
        &self,
        crm_contact_id: &str,
        score: &BehavioralScore,
    ) -> Result<RemoteResponse, RemoteError>;
}

/// The property ledger holding properties, tenants, and maintenance
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Pull remote property state and apply it locally
    async fn sync_properties(&self) -> Result<PropertySyncOutcome, RemoteError>;

    /// Pull remote tenant state and apply it locally
    async fn sync_tenants(&self) -> Result<TenantSyncOutcome, RemoteError>;

    /// Pull remote maintenance tickets and apply them locally
    async fn sync_maintenance(&self) -> Result<MaintenanceSyncOutcome, RemoteError>;

    /// Create a tenant record in the ledger from a converted lead
    async fn create_tenant(
        &self,
        lead: &Lead,
        property: &PropertyState,
    ) -> Result<RemoteResponse, RemoteError>;
}
