#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # RentFlow Core
//!
//! Integration orchestration core for the RentFlow property platform.
//!
//! ## Overview
//!
//! RentFlow Core ingests behavioral events from the operational store,
//! derives a time-decayed engagement score per lead, and coordinates
//! eventually-consistent state synchronization across three systems of
//! record: the local store, the CRM, and the property ledger. Propagation
//! is eventual on the order of minutes by design; the persistent store is
//! always the single source of truth.
//!
//! ## Architecture
//!
//! Four layers, leaves first:
//!
//! - [`resilience`] - bounded retry with jittered exponential backoff,
//!   server retry hints, and cancellable waits
//! - [`scoring`] - behavioral score calculation, segment transitions, and
//!   hot-lead alerting with single-writer-per-lead discipline
//! - [`events`] - periodic sweeps that normalize raw domain rows into
//!   canonical triggers with watermark-based duplicate suppression
//! - [`orchestration`] - the central coordinator: bounded queues with
//!   durable fallback, the full-sync pipeline, webhook dispatch, the retry
//!   sweep, reconciliation, and the unified dashboard
//!
//! Supporting modules: [`models`] (the data layer), [`storage`] (the
//! persistence seam with Postgres and in-memory implementations),
//! [`clients`] (trait seams for the external systems), [`notify`]
//! (the alerting seam), [`lifecycle`] (explicit start/stop state),
//! [`config`], [`constants`], [`error`], and [`logging`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rentflow_core::config::RentflowConfig;
//! use rentflow_core::notify::NullNotifier;
//! use rentflow_core::orchestration::IntegrationOrchestrator;
//! use rentflow_core::scoring::{BehaviorTracker, ScoringEngine};
//! use rentflow_core::storage::{MemoryStorage, Storage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RentflowConfig::load()?;
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! let notifier = Arc::new(NullNotifier);
//!
//! let scoring = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
//! let tracker = Arc::new(BehaviorTracker::new(
//!     storage.clone(),
//!     scoring.clone(),
//!     notifier.clone(),
//! ));
//!
//! let orchestrator = IntegrationOrchestrator::new(
//!     storage, None, None, scoring, tracker, notifier, config,
//! );
//! orchestrator.start();
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod notify;
pub mod orchestration;
pub mod resilience;
pub mod scoring;
pub mod storage;

pub use config::RentflowConfig;
pub use error::{CoreError, Result};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use models::{
    BehavioralEvent, BehavioralScore, IntegrationEvent, Segment, SyncItemStatus, SyncQueueItem,
    SyncReport, SyncStatus, UnifiedDashboard,
};
pub use orchestration::IntegrationOrchestrator;
pub use resilience::retry::{RetryConfig, RetryPolicy};
pub use scoring::{BehaviorTracker, ScoringEngine, ScoringRules};
