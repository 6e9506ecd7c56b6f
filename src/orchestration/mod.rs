//! # Integration Orchestration
//!
//! The central coordinator for eventually-consistent state across the
//! local store, the CRM, and the property ledger.
//!
//! ## Architecture
//!
//! - **Bounded queues, durable fallback**: integration events and sync
//!   work items flow through bounded in-memory queues; overflow degrades
//!   to a direct write, never to a dropped write.
//! - **Full sync pipeline**: the three ledger sub-syncs run in parallel
//!   with independent failure isolation, followed by the sequential CRM
//!   score sync and local reconciliation; every error ends up on one
//!   report with a derived status.
//! - **State-transition handlers**: business transitions record a local
//!   behavioral fact, fire best-effort remote side-effects whose failures
//!   land on the retry queue, and emit one durable integration event.
//! - **Retry sweep**: failed-but-not-exhausted queue items are re-selected
//!   by priority and age and re-attempted in bounded batches.
//! - **Reconciliation**: a periodic storage-only pass corrects known drift
//!   classes between the systems.

pub mod dashboard;
pub mod orchestrator;
pub mod reconciliation;

pub use orchestrator::IntegrationOrchestrator;
