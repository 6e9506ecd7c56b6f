//! Full-sync pipeline: parallel sub-sync isolation, error aggregation,
//! and derived report status.

mod common;

use common::{harness, lead, CrmMode};
use rentflow_core::models::SyncStatus;
use rentflow_core::resilience::retry::RemoteError;

#[tokio::test]
async fn test_full_sync_all_subsystems_succeed() {
    let h = harness();

    let report = h.orchestrator.run_full_sync().await.unwrap();

    assert_eq!(report.status, SyncStatus::Success);
    assert_eq!(report.properties_synced, 4);
    assert_eq!(report.tenants_synced, 3);
    assert_eq!(report.maintenance_synced, 2);
    assert_eq!(report.vacancies_updated, 1);
    assert_eq!(report.error_count, 0);
    assert!(report.completed_at.is_some());
    assert!(report.duration_seconds >= 0.0);
}

#[tokio::test]
async fn test_full_sync_one_failing_subsystem_yields_partial() {
    let h = harness();
    h.ledger.fail_properties("ledger API unreachable");

    let report = h.orchestrator.run_full_sync().await.unwrap();

    assert_eq!(report.status, SyncStatus::Partial);
    // The failed subsystem contributed nothing
    assert_eq!(report.properties_synced, 0);
    // Independent subsystems were not blocked by the failure
    assert_eq!(report.tenants_synced, 3);
    assert_eq!(report.maintenance_synced, 2);
    assert!(report
        .errors
        .iter()
        .any(|e| e.entity == "property_sync" && e.message.contains("unreachable")));
}

#[tokio::test]
async fn test_full_sync_total_failure_still_returns_report() {
    let h = harness();
    h.ledger.fail_properties("down");
    *h.ledger.tenants.lock() = Err(RemoteError::Transport("down".to_string()));
    *h.ledger.maintenance.lock() = Err(RemoteError::Transport("down".to_string()));

    let report = h.orchestrator.run_full_sync().await.unwrap();

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.error_count, 3);
    assert!(!report.made_progress());
}

#[tokio::test]
async fn test_full_sync_pushes_recent_scores_to_crm() {
    let h = harness();
    h.memory.seed_lead(lead(1, "grace@example.com", Some("crm-1")));
    h.scoring.calculate_score(1).await.unwrap();

    let report = h.orchestrator.run_full_sync().await.unwrap();

    assert_eq!(report.leads_synced, 1);
    assert_eq!(h.crm.calls_named("sync_score"), 1);
}

#[tokio::test]
async fn test_full_sync_records_permanent_crm_errors_without_retry() {
    let h = harness();
    h.memory.seed_lead(lead(1, "grace@example.com", Some("crm-1")));
    h.scoring.calculate_score(1).await.unwrap();
    h.crm.set_mode(CrmMode::Status(403));

    let report = h.orchestrator.run_full_sync().await.unwrap();

    assert_eq!(report.leads_synced, 0);
    // 403 is permanent: exactly one attempt, no local retries
    assert_eq!(h.crm.calls_named("sync_score"), 1);
    let error = report
        .errors
        .iter()
        .find(|e| e.operation == "sync_score")
        .expect("permanent error recorded");
    assert!(!error.is_retryable);
}

#[tokio::test]
async fn test_full_sync_runs_reconciliation_pass() {
    let h = harness();
    // Drifted property: vacant per the ledger but left unbookable
    let mut drifted = common::property(9, "L-9");
    drifted.is_bookable = false;
    h.memory.seed_property(drifted);

    let report = h.orchestrator.run_full_sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::Success);

    let repaired = h.memory.properties();
    assert!(repaired.iter().find(|p| p.id == 9).unwrap().is_bookable);
}

#[tokio::test]
async fn test_sync_history_is_recorded() {
    let h = harness();
    h.orchestrator.run_full_sync().await.unwrap();
    h.orchestrator.run_full_sync().await.unwrap();

    let history = h.orchestrator.get_sync_history(10).await.unwrap();
    assert_eq!(history.len(), 2);
    let latest = h.orchestrator.get_last_sync_report().await.unwrap().unwrap();
    assert_eq!(latest.sync_type, "full");
}
