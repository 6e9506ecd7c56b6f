//! # Sync Queue Items
//!
//! A unit of retryable outbound work against an external system.
//!
//! The status machine distinguishes "failed, retry later" from "failed for
//! good": `Failed` items with remaining budget are re-selected by the retry
//! sweep, while `Exhausted` is terminal and requires operator intervention.
//! `increment_retry` is the only transition into `Exhausted`, which keeps
//! the invariant `retry_count <= max_retries`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of a sync queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncItemStatus {
    /// Waiting for the sync-queue consumer
    Pending,
    /// Failed with retry budget remaining
    Failed,
    /// Failed with the retry budget spent; terminal
    Exhausted,
    /// Completed successfully; terminal
    Completed,
}

impl SyncItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted)
    }
}

impl fmt::Display for SyncItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncItemStatus::Pending => write!(f, "pending"),
            SyncItemStatus::Failed => write!(f, "failed"),
            SyncItemStatus::Exhausted => write!(f, "exhausted"),
            SyncItemStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SyncItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncItemStatus::Pending),
            "failed" => Ok(SyncItemStatus::Failed),
            "exhausted" => Ok(SyncItemStatus::Exhausted),
            "completed" => Ok(SyncItemStatus::Completed),
            _ => Err(format!("Invalid sync item status: {s}")),
        }
    }
}

/// A unit of retryable outbound work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub source: String,
    pub destination: String,
    pub payload: Value,
    pub priority: i32,
    pub status: SyncItemStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New sync queue item for insertion (without generated fields).
///
/// `status` distinguishes fresh work (`Pending`, fed to the consumer) from
/// a captured side-effect failure (`Failed`, awaiting the retry sweep).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSyncQueueItem {
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub source: String,
    pub destination: String,
    pub payload: Value,
    pub priority: i32,
    pub status: SyncItemStatus,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

impl SyncQueueItem {
    /// Whether this item is still within its retry budget
    pub fn can_retry(&self) -> bool {
        self.status == SyncItemStatus::Failed && self.retry_count < self.max_retries
    }

    /// Record a failed attempt. Transitions to `Exhausted` when the retry
    /// budget is spent, otherwise to `Failed`.
    pub fn increment_retry(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.status = if self.retry_count >= self.max_retries {
            SyncItemStatus::Exhausted
        } else {
            SyncItemStatus::Failed
        };
        self.updated_at = Utc::now();
    }

    /// Record a permanent remote failure (4xx class). The item goes
    /// straight to `Exhausted`: retrying a permanent error cannot succeed,
    /// so it is surfaced for operator action instead.
    pub fn mark_permanently_failed(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
        self.status = SyncItemStatus::Exhausted;
        self.updated_at = Utc::now();
    }

    /// Record a successful attempt
    pub fn mark_completed(&mut self) {
        self.status = SyncItemStatus::Completed;
        let now = Utc::now();
        self.processed_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(max_retries: i32) -> SyncQueueItem {
        let now = Utc::now();
        SyncQueueItem {
            id: 1,
            entity_type: "lead".to_string(),
            entity_id: "42".to_string(),
            operation: "create_crm_lead".to_string(),
            source: "rentflow".to_string(),
            destination: "crm".to_string(),
            payload: json!({}),
            priority: 5,
            status: SyncItemStatus::Pending,
            retry_count: 0,
            max_retries,
            last_error: None,
            scheduled_at: now,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_retry_budget_exhaustion() {
        let mut it = item(3);

        it.increment_retry("timeout");
        assert_eq!(it.status, SyncItemStatus::Failed);
        assert!(it.can_retry());

        it.increment_retry("timeout");
        assert_eq!(it.status, SyncItemStatus::Failed);
        assert!(it.can_retry());

        it.increment_retry("timeout");
        assert_eq!(it.status, SyncItemStatus::Exhausted);
        assert!(!it.can_retry());
        assert!(it.status.is_terminal());
        assert_eq!(it.retry_count, 3);
    }

    #[test]
    fn test_retry_count_never_exceeds_max() {
        let mut it = item(2);
        it.increment_retry("a");
        it.increment_retry("b");
        assert_eq!(it.retry_count, it.max_retries);
        assert!(!it.can_retry());
    }

    #[test]
    fn test_completion_is_terminal() {
        let mut it = item(3);
        it.mark_completed();
        assert_eq!(it.status, SyncItemStatus::Completed);
        assert!(it.status.is_terminal());
        assert!(it.processed_at.is_some());
    }
}
