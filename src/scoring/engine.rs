//! # Behavioral Scoring Engine
//!
//! Derives the composite score from a lead's full event history and
//! persists it with upsert semantics. The previous segment is read under
//! a per-lead lock before the overwrite, so a transition into the hot
//! segment fires exactly one alert no matter how many recalculations race.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{BehavioralEvent, BehavioralScore, Segment};
use crate::notify::Notifier;
use crate::scoring::rules::ScoringRules;
use crate::storage::Storage;

/// Weights of the component scores in the composite
const URGENCY_WEIGHT: f64 = 0.40;
const ENGAGEMENT_WEIGHT: f64 = 0.40;
const FINANCIAL_WEIGHT: f64 = 0.20;

/// Concurrency bound for batch recalculation
const MAX_CONCURRENT_RESCORES: usize = 8;

/// Calculates and persists behavioral scores for leads
pub struct ScoringEngine {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    rules: ScoringRules,
    /// One lock per lead: previous-segment read and upsert must be atomic
    lead_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ScoringEngine {
    pub fn new(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_rules(storage, notifier, ScoringRules::default())
    }

    pub fn with_rules(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        rules: ScoringRules,
    ) -> Self {
        Self {
            storage,
            notifier,
            rules,
            lead_locks: DashMap::new(),
        }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Recalculate and persist the score for one lead.
    ///
    /// A storage failure aborts the calculation; no partial score is
    /// persisted and the error propagates to the caller.
    pub async fn calculate_score(&self, lead_id: i64) -> Result<BehavioralScore> {
        let lock = self.lead_lock(lead_id);
        let _guard = lock.lock().await;

        let events = self.storage.behavioral_events_for_lead(lead_id).await?;
        let now = Utc::now();

        let urgency = self.calculate_urgency(&events, now);
        let engagement = self.calculate_engagement(&events, now);
        let financial = self.calculate_financial(&events);
        let composite = compose(urgency, engagement, financial);
        let segment = Segment::from_score(composite);

        let score = BehavioralScore {
            id: 0,
            lead_id,
            urgency_score: urgency,
            engagement_score: engagement,
            financial_score: financial,
            composite_score: composite,
            segment,
            score_factors: json!({
                "urgency_score": urgency,
                "engagement_score": engagement,
                "financial_score": financial,
                "total_events": events.len(),
                "segment": segment.to_string(),
            }),
            last_calculated_at: now,
            created_at: now,
            updated_at: now,
        };

        let saved = self.save_score_locked(score).await?;

        info!(
            lead_id = lead_id,
            composite = saved.composite_score,
            segment = %saved.segment,
            "✅ Calculated behavioral score"
        );
        Ok(saved)
    }

    /// Current score for a lead, if one has been calculated
    pub async fn get_score(&self, lead_id: i64) -> Result<Option<BehavioralScore>> {
        self.storage.behavioral_score(lead_id).await
    }

    /// Recalculate every lead's score with per-lead error isolation.
    /// Runs a bounded number of recalculations concurrently; the per-lead
    /// locks keep concurrent writers for the same lead serialized.
    pub async fn recalculate_all(&self) -> Result<usize> {
        let lead_ids = self.storage.all_lead_ids().await?;
        info!(leads = lead_ids.len(), "🔄 Recalculating all behavioral scores");

        let results: Vec<(i64, Result<BehavioralScore>)> =
            stream::iter(lead_ids.into_iter().map(|lead_id| async move {
                (lead_id, self.calculate_score(lead_id).await)
            }))
            .buffer_unordered(MAX_CONCURRENT_RESCORES)
            .collect()
            .await;

        let mut recalculated = 0;
        for (lead_id, result) in results {
            match result {
                Ok(_) => recalculated += 1,
                Err(err) => {
                    warn!(lead_id = lead_id, error = %err, "Failed to recalculate score");
                }
            }
        }

        info!(recalculated = recalculated, "✅ Batch recalculation complete");
        Ok(recalculated)
    }

    /// Upsert the score, detecting a segment transition against the stored
    /// row. Caller must hold the per-lead lock.
    async fn save_score_locked(&self, score: BehavioralScore) -> Result<BehavioralScore> {
        let previous_segment = self
            .storage
            .behavioral_score(score.lead_id)
            .await?
            .map(|existing| Segment::from_score(existing.composite_score));

        let saved = self.storage.upsert_behavioral_score(score).await?;
        let new_segment = Segment::from_score(saved.composite_score);

        if new_segment == Segment::Hot && previous_segment != Some(Segment::Hot) {
            let lead_name = match self.storage.lead(saved.lead_id).await {
                Ok(Some(lead)) => lead.full_name(),
                _ => format!("Lead {}", saved.lead_id),
            };
            // Alert failures never abort the save; the score is already durable
            if let Err(err) = self
                .notifier
                .hot_lead_alert(saved.lead_id, &lead_name, saved.composite_score)
                .await
            {
                warn!(lead_id = saved.lead_id, error = %err, "Hot lead alert failed");
            }
        }

        Ok(saved)
    }

    /// Urgency: decayed base points summed over the full history
    fn calculate_urgency(&self, events: &[BehavioralEvent], now: DateTime<Utc>) -> i32 {
        if events.is_empty() {
            return 0;
        }

        let mut score = 0.0;
        for event in events {
            let points = self.rules.points_for(&event.event_type);
            let days_since = days_between(event.created_at, now);
            score += f64::from(points) * decay_factor(days_since);
        }
        clamp_component(score)
    }

    /// Engagement: frequency (2 points per event, capped at 50) plus a
    /// recency bonus for the most recent event
    fn calculate_engagement(&self, events: &[BehavioralEvent], now: DateTime<Utc>) -> i32 {
        if events.is_empty() {
            return 0;
        }

        let frequency = (events.len() as f64 * 2.0).min(50.0);

        // Events arrive newest-first
        let days_since_last = days_between(events[0].created_at, now);
        let recency = if days_since_last < 1.0 {
            50.0
        } else if days_since_last < 7.0 {
            30.0
        } else if days_since_last < 30.0 {
            10.0
        } else {
            0.0
        };

        clamp_component(frequency + recency)
    }

    /// Financial readiness: fixed points for high-intent actions
    fn calculate_financial(&self, events: &[BehavioralEvent]) -> i32 {
        let mut score = 0;
        for event in events {
            match event.event_type.as_str() {
                "application" => score += 50,
                "inquiry" => score += 20,
                _ => {}
            }
        }
        score.clamp(0, 100)
    }

    fn lead_lock(&self, lead_id: i64) -> Arc<Mutex<()>> {
        self.lead_locks
            .entry(lead_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn compose(urgency: i32, engagement: i32, financial: i32) -> i32 {
    let composite = URGENCY_WEIGHT * f64::from(urgency)
        + ENGAGEMENT_WEIGHT * f64::from(engagement)
        + FINANCIAL_WEIGHT * f64::from(financial);
    debug!(urgency, engagement, financial, composite, "composed score");
    (composite.round() as i32).clamp(0, 100)
}

fn clamp_component(score: f64) -> i32 {
    (score as i32).clamp(0, 100)
}

/// Age decay: full weight for fresh events, down to 10% past 90 days
fn decay_factor(days_since: f64) -> f64 {
    if days_since < 1.0 {
        1.0
    } else if days_since < 7.0 {
        0.8
    } else if days_since < 30.0 {
        0.5
    } else if days_since < 90.0 {
        0.2
    } else {
        0.1
    }
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / 86_400.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use crate::storage::MemoryStorage;
    use crate::models::NewBehavioralEvent;
    use chrono::Duration;

    fn engine(storage: Arc<MemoryStorage>) -> ScoringEngine {
        ScoringEngine::new(storage, Arc::new(NullNotifier))
    }

    async fn seed_event(storage: &MemoryStorage, lead_id: i64, event_type: &str) {
        storage
            .insert_behavioral_event(NewBehavioralEvent {
                lead_id,
                event_type: event_type.to_string(),
                property_id: None,
                payload: json!({}),
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_decay_factor_boundaries() {
        assert_eq!(decay_factor(0.0), 1.0);
        assert_eq!(decay_factor(0.99), 1.0);
        assert_eq!(decay_factor(1.0), 0.8);
        assert_eq!(decay_factor(6.99), 0.8);
        assert_eq!(decay_factor(7.0), 0.5);
        assert_eq!(decay_factor(30.0), 0.2);
        assert_eq!(decay_factor(90.0), 0.1);
        assert_eq!(decay_factor(400.0), 0.1);
    }

    #[test]
    fn test_compose_rounds_and_clamps() {
        assert_eq!(compose(59, 56, 50), 56);
        assert_eq!(compose(0, 0, 0), 0);
        assert_eq!(compose(100, 100, 100), 100);
    }

    #[tokio::test]
    async fn test_empty_history_scores_zero() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine(storage);
        let score = engine.calculate_score(1).await.unwrap();
        assert_eq!(score.composite_score, 0);
        assert_eq!(score.segment, Segment::Dormant);
    }

    #[tokio::test]
    async fn test_worked_example() {
        // Two views (one fresh, one two days old) plus a fresh application:
        // urgency = 5*1.0 + 5*0.8 + 50*1.0 = 59
        // engagement = min(50, 3*2) + 50 = 56
        // financial = 50
        // composite = round(0.4*59 + 0.4*56 + 0.2*50) = 56
        let storage = Arc::new(MemoryStorage::new());
        seed_event(&storage, 1, "viewed").await;
        seed_event(&storage, 1, "viewed").await;
        seed_event(&storage, 1, "application").await;

        // Age the middle view to two days
        {
            let mut events = storage.behavioral_events();
            events.sort_by_key(|e| e.id);
            let aged = events[1].clone();
            // Re-seed through the engine path is not possible for aged rows;
            // recompute manually against a shifted clock instead.
            let engine = engine(storage.clone());
            let now = Utc::now();
            let mut history = vec![events[2].clone(), aged, events[0].clone()];
            history[1].created_at = now - Duration::days(2);

            assert_eq!(engine.calculate_urgency(&history, now), 59);
            assert_eq!(engine.calculate_engagement(&history, now), 56);
            assert_eq!(engine.calculate_financial(&history), 50);
            assert_eq!(compose(59, 56, 50), 56);
        }
    }

    #[tokio::test]
    async fn test_composite_always_in_range() {
        let storage = Arc::new(MemoryStorage::new());
        for _ in 0..40 {
            seed_event(&storage, 1, "application").await;
        }
        seed_event(&storage, 2, "unsubscribed").await;

        let engine = engine(storage);
        let maxed = engine.calculate_score(1).await.unwrap();
        assert!(maxed.composite_score <= 100);
        let negative = engine.calculate_score(2).await.unwrap();
        assert!(negative.composite_score >= 0);
    }

    #[tokio::test]
    async fn test_score_persistence_failure_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        seed_event(&storage, 1, "viewed").await;
        storage.fail_on("upsert_behavioral_score");

        let engine = engine(storage.clone());
        assert!(engine.calculate_score(1).await.is_err());

        storage.clear_failures();
        assert!(storage.behavioral_score(1).await.unwrap().is_none());
    }

    proptest::proptest! {
        #[test]
        fn prop_compose_is_deterministic_and_in_range(
            urgency in 0..=100i32,
            engagement in 0..=100i32,
            financial in 0..=100i32,
        ) {
            let composite = compose(urgency, engagement, financial);
            proptest::prop_assert!((0..=100).contains(&composite));
            proptest::prop_assert_eq!(composite, compose(urgency, engagement, financial));
        }

        #[test]
        fn prop_decay_is_monotonically_nonincreasing(a in 0.0..400.0f64, b in 0.0..400.0f64) {
            let (younger, older) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assert!(decay_factor(younger) >= decay_factor(older));
        }
    }
}
