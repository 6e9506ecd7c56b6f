//! # Event Processor
//!
//! Periodic sweeps over raw event tables that detect trigger-worthy rows,
//! suppress duplicates against the trigger log, and hand canonical
//! triggers to the sink. Each sweep runs as its own background task on
//! its own interval; a single shutdown signal stops all of them.
//!
//! Per-row error isolation is the rule everywhere: one bad row is logged
//! and skipped, never allowed to block the rest of the batch, and source
//! rows are marked processed even when the hand-off fails so a poisoned
//! row cannot wedge the sweep forever.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SweepConfig;
use crate::events::triggers::{CanonicalTrigger, TriggerSink};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::storage::Storage;

/// Minimum qualifying views in the trailing hour for the hot-lead sweep
const HOT_LEAD_MIN_VIEWS: i64 = 3;

/// Detects canonical triggers in raw domain rows. Clones share the same
/// lifecycle and storage handles, so the background tasks operate on the
/// same state as the handle the caller keeps.
#[derive(Clone)]
pub struct EventProcessor {
    storage: Arc<dyn Storage>,
    sink: Arc<dyn TriggerSink>,
    config: SweepConfig,
    lifecycle: Arc<Lifecycle>,
}

impl EventProcessor {
    pub fn new(storage: Arc<dyn Storage>, sink: Arc<dyn TriggerSink>, config: SweepConfig) -> Self {
        Self {
            storage,
            sink,
            config,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Launch the three sweep tasks. Idempotent: a second call while
    /// running is a no-op.
    pub fn start(&self) {
        if !self.lifecycle.begin_start() {
            warn!("⚠️ Event processor already running");
            return;
        }

        info!("🚀 Event processor started - monitoring for automation triggers");

        let price = self.clone();
        tokio::spawn(async move { price.price_change_loop().await });

        let hot = self.clone();
        tokio::spawn(async move { hot.hot_lead_loop().await });

        let showings = self.clone();
        tokio::spawn(async move { showings.showing_follow_up_loop().await });

        self.lifecycle.complete_start();
    }

    /// Signal all sweep tasks to exit. Idempotent.
    pub fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        info!("🛑 Stopping event processor");
        self.lifecycle.complete_stop();
    }

    async fn price_change_loop(self) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        let mut ticker = tokio::time::interval(self.config.price_change_interval());
        ticker.tick().await; // discard the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.lifecycle.state() != LifecycleState::Running {
                        break;
                    }
                    self.sweep_price_changes().await;
                }
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, &shutdown) {
                        break;
                    }
                }
            }
        }
        debug!("price change sweep exited");
    }

    async fn hot_lead_loop(self) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        let mut ticker = tokio::time::interval(self.config.hot_lead_interval());
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.lifecycle.state() != LifecycleState::Running {
                        break;
                    }
                    self.sweep_hot_leads().await;
                }
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, &shutdown) {
                        break;
                    }
                }
            }
        }
        debug!("hot lead sweep exited");
    }

    async fn showing_follow_up_loop(self) {
        let mut shutdown = self.lifecycle.shutdown_signal();
        let mut ticker = tokio::time::interval(self.config.showing_interval());
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.lifecycle.state() != LifecycleState::Running {
                        break;
                    }
                    self.sweep_showing_follow_ups().await;
                }
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, &shutdown) {
                        break;
                    }
                }
            }
        }
        debug!("showing follow-up sweep exited");
    }

    /// Price-change sweep: only decreases trigger; every row is marked
    /// processed regardless of hand-off outcome.
    pub async fn sweep_price_changes(&self) {
        let events = match self
            .storage
            .unprocessed_price_changes(self.config.price_change_batch)
            .await
        {
            Ok(events) => events,
            Err(err) => {
                error!(error = %err, "❌ Failed to fetch price change events");
                return;
            }
        };

        if events.is_empty() {
            return;
        }

        info!(count = events.len(), "📊 Processing price change events");

        for event in events {
            let mut emitted = false;

            if event.change_amount < 0.0 {
                let trigger = CanonicalTrigger::PriceDropped {
                    property_id: event.property_id,
                    property_address: event.property_address.clone(),
                    old_price: event.old_price,
                    new_price: event.new_price,
                    change_amount: event.change_amount,
                    change_percent: event.change_percent,
                };
                match self.emit(trigger).await {
                    Ok(()) => emitted = true,
                    Err(err) => {
                        error!(event_id = event.id, error = %err, "❌ Price drop hand-off failed");
                    }
                }
            }

            // Mark processed even when the hand-off failed: a poisoned row
            // must not block the batch on every future sweep
            if let Err(err) = self
                .storage
                .mark_price_change_processed(event.id, emitted)
                .await
            {
                error!(event_id = event.id, error = %err, "❌ Failed to mark price change processed");
            }
        }
    }

    /// Hot-lead sweep: at least three views in the trailing hour, score at
    /// or above the hot threshold, and no duplicate trigger within the
    /// cooldown.
    pub async fn sweep_hot_leads(&self) {
        let now = Utc::now();
        let window_start = now - ChronoDuration::hours(1);
        let cooldown_start = now - ChronoDuration::hours(self.config.trigger_cooldown_hours);

        let lead_ids = match self
            .storage
            .leads_with_min_views_since(HOT_LEAD_MIN_VIEWS, window_start)
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "❌ Failed to query active leads");
                return;
            }
        };

        for lead_id in lead_ids {
            match self
                .storage
                .trigger_emitted_since(
                    crate::constants::triggers::LEAD_SCORED_HOT,
                    lead_id,
                    cooldown_start,
                )
                .await
            {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    warn!(lead_id = lead_id, error = %err, "Watermark check failed");
                    continue;
                }
            }

            let score = match self.storage.behavioral_score(lead_id).await {
                Ok(Some(score)) => score,
                Ok(None) => continue,
                Err(err) => {
                    warn!(lead_id = lead_id, error = %err, "Score lookup failed");
                    continue;
                }
            };

            if score.composite_score < self.config.hot_score_threshold {
                continue;
            }

            let trigger = CanonicalTrigger::LeadScoredHot {
                lead_id,
                composite_score: score.composite_score,
                urgency_score: score.urgency_score,
                engagement_score: score.engagement_score,
            };
            match self.emit(trigger).await {
                Ok(()) => {
                    info!(lead_id = lead_id, score = score.composite_score, "🔥 Hot lead detected");
                }
                Err(err) => {
                    error!(lead_id = lead_id, error = %err, "❌ Hot lead hand-off failed");
                }
            }
        }
    }

    /// Showing follow-up sweep: confirmed bookings whose showing finished
    /// 2–4 hours ago and haven't had a follow-up yet.
    pub async fn sweep_showing_follow_ups(&self) {
        let now = Utc::now();
        let from = now - ChronoDuration::hours(4);
        let to = now - ChronoDuration::hours(2);

        let bookings = match self
            .storage
            .confirmed_bookings_between(from, to, self.config.showing_batch)
            .await
        {
            Ok(bookings) => bookings,
            Err(err) => {
                error!(error = %err, "❌ Failed to query completed showings");
                return;
            }
        };

        for booking in bookings {
            let Some(crm_contact_id) = booking.crm_contact_id.clone() else {
                continue;
            };

            match self
                .storage
                .trigger_emitted_since(
                    crate::constants::triggers::SHOWING_COMPLETED,
                    booking.id,
                    // Follow-ups are once per booking; the watermark window
                    // only needs to outlive the sweep's 2-4h detection band
                    now - ChronoDuration::hours(self.config.trigger_cooldown_hours),
                )
                .await
            {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    warn!(booking_id = booking.id, error = %err, "Watermark check failed");
                    continue;
                }
            }

            let trigger = CanonicalTrigger::ShowingCompleted {
                booking_id: booking.id,
                crm_contact_id,
                property_address: booking.property_address.clone(),
                showing_at: booking.showing_at,
            };
            match self.emit(trigger).await {
                Ok(()) => {
                    info!(booking_id = booking.id, "📧 Triggered showing follow-up");
                }
                Err(err) => {
                    error!(booking_id = booking.id, error = %err, "❌ Follow-up hand-off failed");
                }
            }
        }
    }

    /// Log the trigger (the watermark write) before handing it off, so a
    /// crash between the two suppresses rather than duplicates.
    async fn emit(&self, trigger: CanonicalTrigger) -> crate::error::Result<()> {
        self.storage
            .record_trigger(trigger.trigger_type(), trigger.subject_id(), trigger.payload())
            .await?;
        self.sink.handle_trigger(trigger).await
    }
}

/// True when the select arm on the shutdown channel means "exit now"
fn shutdown_requested(
    changed: std::result::Result<(), watch::error::RecvError>,
    shutdown: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *shutdown.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, PriceChangeEvent};
    use crate::storage::MemoryStorage;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        triggers: Mutex<Vec<CanonicalTrigger>>,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl TriggerSink for RecordingSink {
        async fn handle_trigger(&self, trigger: CanonicalTrigger) -> crate::error::Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::CoreError::Orchestration("sink down".to_string()));
            }
            self.triggers.lock().push(trigger);
            Ok(())
        }
    }

    fn processor(storage: Arc<MemoryStorage>, sink: Arc<RecordingSink>) -> EventProcessor {
        EventProcessor::new(storage, sink, SweepConfig::default())
    }

    fn price_change(id: i64, change_amount: f64) -> PriceChangeEvent {
        PriceChangeEvent {
            id,
            property_id: 100 + id,
            property_address: format!("{id} Main St"),
            old_price: 2000.0,
            new_price: 2000.0 + change_amount,
            change_amount,
            change_percent: change_amount / 20.0,
            created_at: Utc::now(),
            processed_at: None,
            trigger_emitted: false,
        }
    }

    #[tokio::test]
    async fn test_price_sweep_only_decreases_trigger() {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed_price_change(price_change(1, -150.0));
        storage.seed_price_change(price_change(2, 75.0));

        let sink = Arc::new(RecordingSink::default());
        let processor = processor(storage.clone(), sink.clone());
        processor.sweep_price_changes().await;

        let triggers = sink.triggers.lock();
        assert_eq!(triggers.len(), 1);
        assert!(matches!(
            triggers[0],
            CanonicalTrigger::PriceDropped { change_amount, .. } if change_amount < 0.0
        ));
        drop(triggers);

        // Both rows marked processed, increase included
        let remaining = storage.unprocessed_price_changes(50).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_price_sweep_marks_processed_on_handoff_failure() {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed_price_change(price_change(1, -150.0));

        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let processor = processor(storage.clone(), sink);
        processor.sweep_price_changes().await;

        assert!(storage.unprocessed_price_changes(50).await.unwrap().is_empty());
    }

    async fn seed_views(storage: &MemoryStorage, lead_id: i64, count: usize) {
        for _ in 0..count {
            storage
                .insert_behavioral_event(crate::models::NewBehavioralEvent {
                    lead_id,
                    event_type: "viewed".to_string(),
                    property_id: None,
                    payload: json!({}),
                })
                .await
                .unwrap();
        }
    }

    async fn seed_score(storage: &MemoryStorage, lead_id: i64, composite: i32) {
        let now = Utc::now();
        storage
            .upsert_behavioral_score(crate::models::BehavioralScore {
                id: 0,
                lead_id,
                urgency_score: composite,
                engagement_score: composite,
                financial_score: composite,
                composite_score: composite,
                segment: crate::models::Segment::from_score(composite),
                score_factors: json!({}),
                last_calculated_at: now,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hot_lead_sweep_applies_threshold_and_watermark() {
        let storage = Arc::new(MemoryStorage::new());
        seed_views(&storage, 1, 3).await;
        seed_score(&storage, 1, 85).await;
        seed_views(&storage, 2, 3).await;
        seed_score(&storage, 2, 45).await; // warm, below threshold
        seed_views(&storage, 3, 2).await; // too few views
        seed_score(&storage, 3, 90).await;

        let sink = Arc::new(RecordingSink::default());
        let processor = processor(storage.clone(), sink.clone());

        processor.sweep_hot_leads().await;
        assert_eq!(sink.triggers.lock().len(), 1);
        assert_eq!(sink.triggers.lock()[0].subject_id(), Some(1));

        // Second sweep inside the cooldown emits nothing new
        processor.sweep_hot_leads().await;
        assert_eq!(sink.triggers.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_showing_sweep_window_and_dedupe() {
        let storage = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        storage.seed_booking(Booking {
            id: 1,
            reference: "BK-1".to_string(),
            property_id: 10,
            property_address: "1 Main St".to_string(),
            crm_contact_id: Some("crm-1".to_string()),
            showing_at: now - ChronoDuration::hours(3),
            status: "confirmed".to_string(),
        });
        storage.seed_booking(Booking {
            id: 2,
            reference: "BK-2".to_string(),
            property_id: 11,
            property_address: "2 Main St".to_string(),
            crm_contact_id: Some("crm-2".to_string()),
            showing_at: now - ChronoDuration::hours(1), // too recent
            status: "confirmed".to_string(),
        });
        storage.seed_booking(Booking {
            id: 3,
            reference: "BK-3".to_string(),
            property_id: 12,
            property_address: "3 Main St".to_string(),
            crm_contact_id: None, // no CRM contact, nothing to follow up
            showing_at: now - ChronoDuration::hours(3),
            status: "confirmed".to_string(),
        });

        let sink = Arc::new(RecordingSink::default());
        let processor = processor(storage.clone(), sink.clone());

        processor.sweep_showing_follow_ups().await;
        assert_eq!(sink.triggers.lock().len(), 1);
        assert_eq!(sink.triggers.lock()[0].subject_id(), Some(1));

        processor.sweep_showing_follow_ups().await;
        assert_eq!(sink.triggers.lock().len(), 1, "follow-up fires once per booking");
    }

    #[tokio::test]
    async fn test_start_twice_spawns_one_task_set() {
        let storage = Arc::new(MemoryStorage::new());
        let sink = Arc::new(RecordingSink::default());
        let processor = processor(storage, sink);

        processor.start();
        assert_eq!(processor.state(), LifecycleState::Running);
        processor.start(); // no-op
        assert_eq!(processor.state(), LifecycleState::Running);

        processor.stop();
        assert_eq!(processor.state(), LifecycleState::Stopped);
        processor.stop(); // no-op
        assert_eq!(processor.state(), LifecycleState::Stopped);
    }
}
