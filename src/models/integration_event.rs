//! # Integration Events
//!
//! Durable records of cross-system occurrences, written both synchronously
//! (webhook ingestion persists before processing) and asynchronously via
//! the orchestrator's bounded event queue. Once written, only `status` and
//! `processed_at` ever change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Processing status of an integration event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processed,
    Failed,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Processed => write!(f, "processed"),
            EventStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "processed" => Ok(EventStatus::Processed),
            "failed" => Ok(EventStatus::Failed),
            _ => Err(format!("Invalid event status: {s}")),
        }
    }
}

/// A durable record of a cross-system occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub id: i64,
    pub event_type: String,
    pub source: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// New integration event for insertion (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntegrationEvent {
    pub event_type: String,
    pub source: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
}

impl NewIntegrationEvent {
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
        }
    }
}
