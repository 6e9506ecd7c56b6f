//! # Behavioral Event Tracking
//!
//! Ingestion point for behavioral facts. `track_event` persists the event
//! synchronously (the fact is durable before the caller returns) and
//! spawns the recalculation, so producers never wait on scoring math or
//! notification delivery.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{BehavioralEvent, NewBehavioralEvent};
use crate::notify::Notifier;
use crate::scoring::engine::ScoringEngine;
use crate::storage::Storage;

/// Composite-score jump that counts as an engagement spike
const SPIKE_DELTA: i32 = 20;

/// Records behavioral events and drives asynchronous rescoring
pub struct BehaviorTracker {
    storage: Arc<dyn Storage>,
    engine: Arc<ScoringEngine>,
    notifier: Arc<dyn Notifier>,
}

impl BehaviorTracker {
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<ScoringEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            storage,
            engine,
            notifier,
        }
    }

    /// Persist a behavioral fact and trigger rescoring in the background.
    ///
    /// The insert failure propagates; everything after the insert is
    /// best-effort and observed only through logs and notifications.
    pub async fn track_event(
        &self,
        lead_id: i64,
        event_type: &str,
        metadata: Value,
        property_id: Option<i64>,
    ) -> Result<BehavioralEvent> {
        let event = self
            .storage
            .insert_behavioral_event(NewBehavioralEvent {
                lead_id,
                event_type: event_type.to_string(),
                property_id,
                payload: metadata,
            })
            .await?;

        info!(lead_id = lead_id, event_type = %event_type, "✅ Tracked behavioral event");

        // Previous composite read before the rescore so a spike is measured
        // against the pre-event state
        let previous_composite = self
            .engine
            .get_score(lead_id)
            .await
            .ok()
            .flatten()
            .map_or(0, |s| s.composite_score);

        let engine = self.engine.clone();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let new_score = match engine.calculate_score(lead_id).await {
                Ok(score) => score,
                Err(err) => {
                    warn!(lead_id = lead_id, error = %err, "Rescore after tracked event failed");
                    return;
                }
            };

            let delta = new_score.composite_score - previous_composite;
            if delta >= SPIKE_DELTA {
                if let Err(err) = notifier
                    .engagement_spike(lead_id, delta, new_score.composite_score)
                    .await
                {
                    warn!(lead_id = lead_id, error = %err, "Engagement spike alert failed");
                }
            }
        });

        Ok(event)
    }

    /// Recalculate without recording a new fact (API-driven refresh)
    pub async fn recalculate(&self, lead_id: i64) -> Result<crate::models::BehavioralScore> {
        self.engine.calculate_score(lead_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_track_event_persists_before_returning() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(NullNotifier);
        let engine = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
        let tracker = BehaviorTracker::new(storage.clone(), engine, notifier);

        let event = assert_ok!(
            tracker
                .track_event(9, "viewed", json!({"page": "listing"}), Some(4))
                .await
        );

        assert_eq!(event.lead_id, 9);
        assert_eq!(storage.behavioral_events().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_on("insert_behavioral_event");
        let notifier = Arc::new(NullNotifier);
        let engine = Arc::new(ScoringEngine::new(storage.clone(), notifier.clone()));
        let tracker = BehaviorTracker::new(storage, engine, notifier);

        assert!(tracker.track_event(9, "viewed", json!({}), None).await.is_err());
    }
}
