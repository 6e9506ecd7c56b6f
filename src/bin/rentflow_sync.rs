//! Operational entry point: run one full three-way sync against the
//! configured database and print the resulting report. External clients
//! are wired by the embedding service; standalone runs exercise the local
//! passes (reconciliation, score sync candidates) only.

use std::sync::Arc;

use anyhow::Context;

use rentflow_core::config::RentflowConfig;
use rentflow_core::logging::init_structured_logging;
use rentflow_core::notify::NullNotifier;
use rentflow_core::orchestration::IntegrationOrchestrator;
use rentflow_core::scoring::{BehaviorTracker, ScoringEngine};
use rentflow_core::storage::{PostgresStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = RentflowConfig::load().context("loading configuration")?;
    let storage: Arc<dyn Storage> = Arc::new(
        PostgresStorage::connect(&config.database)
            .await
            .context("connecting to database")?,
    );

    let notifier = Arc::new(NullNotifier);
    let scoring = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
    let tracker = Arc::new(BehaviorTracker::new(
        storage.clone(),
        scoring.clone(),
        notifier.clone(),
    ));

    let orchestrator =
        IntegrationOrchestrator::new(storage, None, None, scoring, tracker, notifier, config);

    let report = orchestrator
        .run_full_sync()
        .await
        .context("running full sync")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let dashboard = orchestrator.get_unified_dashboard().await;
    println!("{}", serde_json::to_string_pretty(&dashboard)?);

    Ok(())
}
