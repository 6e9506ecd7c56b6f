//! # Sync Reports and Errors
//!
//! One report row per full-sync or retry-sweep execution, with the error
//! list embedded. Status is derived, never assigned directly: success iff
//! zero errors, partial iff errors alongside progress, failed otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall status of a sync execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Success,
    Partial,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::InProgress => write!(f, "in_progress"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Partial => write!(f, "partial"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SyncStatus::InProgress),
            "success" => Ok(SyncStatus::Success),
            "partial" => Ok(SyncStatus::Partial),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(format!("Invalid sync status: {s}")),
        }
    }
}

/// A single failure observed during a sync pass; always embedded in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncError {
    pub entity: String,
    pub entity_id: String,
    pub operation: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_retryable: bool,
}

impl SyncError {
    pub fn new(
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
        is_retryable: bool,
    ) -> Self {
        Self {
            entity: entity.into(),
            entity_id: entity_id.into(),
            operation: operation.into(),
            message: message.into(),
            timestamp: Utc::now(),
            is_retryable,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}: {}",
            self.entity, self.entity_id, self.operation, self.message
        )
    }
}

/// One row per full-sync or retry-sweep execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub properties_synced: i32,
    pub tenants_synced: i32,
    pub leads_synced: i32,
    pub maintenance_synced: i32,
    pub vacancies_updated: i32,
    pub errors: Vec<SyncError>,
    pub error_count: i32,
    pub status: SyncStatus,
    pub sync_type: String,
    pub triggered_by: String,
    pub crm_last_sync: Option<DateTime<Utc>>,
    pub ledger_last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncReport {
    /// Begin a new report in the in-progress state
    pub fn begin(sync_type: impl Into<String>, triggered_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            started_at: now,
            completed_at: None,
            duration_seconds: 0.0,
            properties_synced: 0,
            tenants_synced: 0,
            leads_synced: 0,
            maintenance_synced: 0,
            vacancies_updated: 0,
            errors: Vec::new(),
            error_count: 0,
            status: SyncStatus::InProgress,
            sync_type: sync_type.into(),
            triggered_by: triggered_by.into(),
            crm_last_sync: None,
            ledger_last_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any subsystem made progress during this execution
    pub fn made_progress(&self) -> bool {
        self.properties_synced > 0
            || self.tenants_synced > 0
            || self.leads_synced > 0
            || self.maintenance_synced > 0
    }

    /// Seal the report: stamp completion time, count errors, derive status
    pub fn finalize(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_seconds = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.error_count = self.errors.len() as i32;
        self.status = if self.error_count == 0 {
            SyncStatus::Success
        } else if self.made_progress() {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        };
        self.updated_at = now;
    }
}

/// Outcome of a property sync pass against the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySyncOutcome {
    pub synced: i32,
    pub vacancies_updated: i32,
    pub errors: Vec<SyncError>,
}

/// Outcome of a tenant sync pass against the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantSyncOutcome {
    pub synced: i32,
    pub errors: Vec<SyncError>,
}

/// Outcome of a maintenance sync pass against the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceSyncOutcome {
    pub synced: i32,
    pub emergency_count: i32,
    pub errors: Vec<SyncError>,
}

/// Outcome of a lead-score sync pass against the CRM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadSyncOutcome {
    pub synced: i32,
    pub errors: Vec<SyncError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation_success() {
        let mut report = SyncReport::begin("full", "test");
        report.properties_synced = 3;
        report.finalize();
        assert_eq!(report.status, SyncStatus::Success);
        assert!(report.completed_at.is_some());
    }

    #[test]
    fn test_status_derivation_partial() {
        let mut report = SyncReport::begin("full", "test");
        report.tenants_synced = 2;
        report
            .errors
            .push(SyncError::new("property_sync", "", "ledger_sync", "boom", true));
        report.finalize();
        assert_eq!(report.status, SyncStatus::Partial);
        assert_eq!(report.error_count, 1);
    }

    #[test]
    fn test_status_derivation_failed() {
        let mut report = SyncReport::begin("full", "test");
        report
            .errors
            .push(SyncError::new("property_sync", "", "ledger_sync", "boom", true));
        report.finalize();
        assert_eq!(report.status, SyncStatus::Failed);
    }
}
