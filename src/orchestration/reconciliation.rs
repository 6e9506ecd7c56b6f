//! # Cross-System Reconciliation
//!
//! A corrective pass over local state that resolves detected drift without
//! any external calls. Two drift classes are handled:
//!
//! 1. Properties flagged vacant by the ledger but left unbookable locally
//!    (the two status flags are updated by different paths and disagree
//!    after partial failures) are forced bookable.
//! 2. Active tenants missing their CRM back-reference are joined to leads
//!    by email and backfilled.
//!
//! Everything here is best-effort: unresolvable rows are reported and left
//! for the next cycle, never dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::SyncError;
use crate::storage::Storage;

/// Run one reconciliation pass. Returns the errors encountered; an empty
/// list means every detected drift was corrected.
pub async fn reconcile(storage: &Arc<dyn Storage>) -> Vec<SyncError> {
    let mut errors = Vec::new();

    reconcile_bookable_flags(storage, &mut errors).await;
    reconcile_tenant_crm_links(storage, &mut errors).await;

    if errors.is_empty() {
        debug!("🔗 Reconciliation pass clean");
    } else {
        warn!(errors = errors.len(), "🔗 Reconciliation pass left unresolved drift");
    }
    errors
}

async fn reconcile_bookable_flags(storage: &Arc<dyn Storage>, errors: &mut Vec<SyncError>) {
    let stranded = match storage.vacant_unbookable_properties().await {
        Ok(properties) => properties,
        Err(err) => {
            errors.push(SyncError::new(
                "property",
                "",
                "reconcile_bookable",
                err.to_string(),
                true,
            ));
            return;
        }
    };

    for property in stranded {
        match storage.force_property_bookable(property.id).await {
            Ok(()) => {
                info!(property_id = property.id, address = %property.address,
                    "🔧 Forced vacant property bookable");
            }
            Err(err) => {
                errors.push(SyncError::new(
                    "property",
                    property.id.to_string(),
                    "reconcile_bookable",
                    err.to_string(),
                    true,
                ));
            }
        }
    }
}

async fn reconcile_tenant_crm_links(storage: &Arc<dyn Storage>, errors: &mut Vec<SyncError>) {
    let unlinked = match storage.active_tenants_missing_crm_contact().await {
        Ok(tenants) => tenants,
        Err(err) => {
            errors.push(SyncError::new(
                "tenant",
                "",
                "reconcile_crm_link",
                err.to_string(),
                true,
            ));
            return;
        }
    };

    for tenant in unlinked {
        let lead = match storage.lead_by_email(&tenant.email).await {
            Ok(Some(lead)) => lead,
            // No matching lead yet; a future sync may create one
            Ok(None) => continue,
            Err(err) => {
                errors.push(SyncError::new(
                    "tenant",
                    tenant.id.to_string(),
                    "reconcile_crm_link",
                    err.to_string(),
                    true,
                ));
                continue;
            }
        };

        let Some(crm_contact_id) = lead.crm_contact_id.clone() else {
            continue;
        };

        match storage
            .link_tenant_to_lead(tenant.id, &crm_contact_id, lead.id)
            .await
        {
            Ok(()) => {
                info!(tenant_id = tenant.id, lead_id = lead.id, "🔧 Backfilled tenant CRM link");
            }
            Err(err) => {
                errors.push(SyncError::new(
                    "tenant",
                    tenant.id.to_string(),
                    "reconcile_crm_link",
                    err.to_string(),
                    true,
                ));
            }
        }
    }
}
