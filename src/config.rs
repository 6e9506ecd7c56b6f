//! # RentFlow Configuration System
//!
//! Explicit, validated configuration loading for the integration core.
//! Values come from an optional YAML file plus `RENTFLOW_`-prefixed
//! environment overrides; every field has a default mirroring the
//! production constants, so an empty environment yields a working config.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rentflow_core::config::RentflowConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RentflowConfig::load()?;
//! assert!(config.queues.event_capacity > 0);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Root configuration for the integration core
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RentflowConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub sweeps: SweepConfig,

    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "defaults::database_url")]
    pub url: String,

    #[serde(default = "defaults::max_connections")]
    pub max_connections: u32,
}

/// Bounded in-memory queue capacities. Overflow falls back to direct
/// persistence, so these bound throughput, not correctness.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "defaults::event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "defaults::sync_capacity")]
    pub sync_capacity: usize,
}

/// Intervals and batch bounds for the event processor sweeps
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    #[serde(default = "defaults::price_change_interval_secs")]
    pub price_change_interval_secs: u64,

    #[serde(default = "defaults::hot_lead_interval_secs")]
    pub hot_lead_interval_secs: u64,

    #[serde(default = "defaults::showing_interval_secs")]
    pub showing_interval_secs: u64,

    #[serde(default = "defaults::price_change_batch")]
    pub price_change_batch: i64,

    #[serde(default = "defaults::showing_batch")]
    pub showing_batch: i64,

    /// Suppression window for duplicate triggers, keyed lead + trigger type
    #[serde(default = "defaults::trigger_cooldown_hours")]
    pub trigger_cooldown_hours: i64,

    /// Composite score at or above which a lead counts as hot
    #[serde(default = "defaults::hot_score_threshold")]
    pub hot_score_threshold: i32,
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconciliationConfig {
    #[serde(default = "defaults::reconciliation_interval_secs")]
    pub interval_secs: u64,
}

/// Remote-call retry settings, converted into a
/// [`crate::resilience::retry::RetryConfig`] at wiring time
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "defaults::retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

mod defaults {
    pub fn database_url() -> String {
        "postgres://localhost/rentflow_development".to_string()
    }
    pub fn max_connections() -> u32 {
        10
    }
    pub fn event_capacity() -> usize {
        500
    }
    pub fn sync_capacity() -> usize {
        1000
    }
    pub fn price_change_interval_secs() -> u64 {
        60
    }
    pub fn hot_lead_interval_secs() -> u64 {
        300
    }
    pub fn showing_interval_secs() -> u64 {
        600
    }
    pub fn price_change_batch() -> i64 {
        50
    }
    pub fn showing_batch() -> i64 {
        20
    }
    pub fn trigger_cooldown_hours() -> i64 {
        48
    }
    pub fn hot_score_threshold() -> i32 {
        70
    }
    pub fn reconciliation_interval_secs() -> u64 {
        1800
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_delay_ms() -> u64 {
        1000
    }
    pub fn max_delay_ms() -> u64 {
        30_000
    }
    pub fn backoff_factor() -> f64 {
        2.0
    }
    pub fn retryable_statuses() -> Vec<u16> {
        vec![429, 500, 502, 503, 504]
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::database_url(),
            max_connections: defaults::max_connections(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            event_capacity: defaults::event_capacity(),
            sync_capacity: defaults::sync_capacity(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            price_change_interval_secs: defaults::price_change_interval_secs(),
            hot_lead_interval_secs: defaults::hot_lead_interval_secs(),
            showing_interval_secs: defaults::showing_interval_secs(),
            price_change_batch: defaults::price_change_batch(),
            showing_batch: defaults::showing_batch(),
            trigger_cooldown_hours: defaults::trigger_cooldown_hours(),
            hot_score_threshold: defaults::hot_score_threshold(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::reconciliation_interval_secs(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_delay_ms: defaults::initial_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            backoff_factor: defaults::backoff_factor(),
            retryable_statuses: defaults::retryable_statuses(),
        }
    }
}

impl Default for RentflowConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queues: QueueConfig::default(),
            sweeps: SweepConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl RentflowConfig {
    /// Load configuration from `RENTFLOW_CONFIG` (YAML, optional) with
    /// `RENTFLOW_`-prefixed environment overrides layered on top.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("RENTFLOW_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("RENTFLOW").separator("__"))
            .build()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| CoreError::Configuration(e.to_string()))
    }
}

impl SweepConfig {
    pub fn price_change_interval(&self) -> Duration {
        Duration::from_secs(self.price_change_interval_secs)
    }

    pub fn hot_lead_interval(&self) -> Duration {
        Duration::from_secs(self.hot_lead_interval_secs)
    }

    pub fn showing_interval(&self) -> Duration {
        Duration::from_secs(self.showing_interval_secs)
    }
}

impl ReconciliationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_constants() {
        let config = RentflowConfig::default();
        assert_eq!(config.queues.event_capacity, 500);
        assert_eq!(config.queues.sync_capacity, 1000);
        assert_eq!(config.sweeps.price_change_interval_secs, 60);
        assert_eq!(config.sweeps.hot_lead_interval_secs, 300);
        assert_eq!(config.sweeps.showing_interval_secs, 600);
        assert_eq!(config.sweeps.trigger_cooldown_hours, 48);
        assert_eq!(config.reconciliation.interval_secs, 1800);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retryable_statuses, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn test_load_with_empty_environment() {
        let config = RentflowConfig::load().expect("load should succeed with defaults");
        assert_eq!(config.sweeps.hot_score_threshold, 70);
    }

    #[test]
    fn test_yaml_file_overrides_one_field() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("rentflow.yaml");
        std::fs::write(&path, "queues:\n  event_capacity: 64\n").expect("write config");

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .expect("build config");
        let config: RentflowConfig = settings.try_deserialize().expect("deserialize");

        assert_eq!(config.queues.event_capacity, 64);
        // Untouched sections keep their defaults
        assert_eq!(config.queues.sync_capacity, 1000);
        assert_eq!(config.retry.max_retries, 3);
    }
}
