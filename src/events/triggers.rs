//! # Canonical Triggers
//!
//! Normalized business events derived from raw domain rows. A trigger
//! carries everything downstream handlers need, but handlers re-read
//! current state rather than trusting the payload: triggers and webhooks
//! for the same subject can arrive out of order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::constants::triggers;
use crate::error::Result;

/// A normalized business event emitted by the sweeps
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalTrigger {
    /// A listing price moved down
    PriceDropped {
        property_id: i64,
        property_address: String,
        old_price: f64,
        new_price: f64,
        change_amount: f64,
        change_percent: f64,
    },
    /// A lead's recent activity and score crossed the hot threshold
    LeadScoredHot {
        lead_id: i64,
        composite_score: i32,
        urgency_score: i32,
        engagement_score: i32,
    },
    /// A confirmed showing finished a couple of hours ago
    ShowingCompleted {
        booking_id: i64,
        crm_contact_id: String,
        property_address: String,
        showing_at: DateTime<Utc>,
    },
}

impl CanonicalTrigger {
    /// Wire-stable trigger name
    pub fn trigger_type(&self) -> &'static str {
        match self {
            CanonicalTrigger::PriceDropped { .. } => triggers::PRICE_DROPPED,
            CanonicalTrigger::LeadScoredHot { .. } => triggers::LEAD_SCORED_HOT,
            CanonicalTrigger::ShowingCompleted { .. } => triggers::SHOWING_COMPLETED,
        }
    }

    /// The watermark key this trigger dedupes on, when it has one
    pub fn subject_id(&self) -> Option<i64> {
        match self {
            CanonicalTrigger::PriceDropped { .. } => None,
            CanonicalTrigger::LeadScoredHot { lead_id, .. } => Some(*lead_id),
            CanonicalTrigger::ShowingCompleted { booking_id, .. } => Some(*booking_id),
        }
    }

    /// Payload recorded in the trigger log and integration event
    pub fn payload(&self) -> Value {
        match self {
            CanonicalTrigger::PriceDropped {
                property_id,
                property_address,
                old_price,
                new_price,
                change_amount,
                change_percent,
            } => json!({
                "property_id": property_id,
                "property_address": property_address,
                "old_price": old_price,
                "new_price": new_price,
                "change_amount": change_amount,
                "change_percent": change_percent,
            }),
            CanonicalTrigger::LeadScoredHot {
                lead_id,
                composite_score,
                urgency_score,
                engagement_score,
            } => json!({
                "lead_id": lead_id,
                "composite_score": composite_score,
                "urgency_score": urgency_score,
                "engagement_score": engagement_score,
            }),
            CanonicalTrigger::ShowingCompleted {
                booking_id,
                crm_contact_id,
                property_address,
                showing_at,
            } => json!({
                "booking_id": booking_id,
                "crm_contact_id": crm_contact_id,
                "property_address": property_address,
                "showing_at": showing_at.to_rfc3339(),
            }),
        }
    }
}

/// Downstream consumer of canonical triggers
#[async_trait]
pub trait TriggerSink: Send + Sync {
    async fn handle_trigger(&self, trigger: CanonicalTrigger) -> Result<()>;
}
