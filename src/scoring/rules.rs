//! # Scoring Rules
//!
//! Base point values per behavioral event type. Unknown event types score
//! zero so new producers can ship event types before scoring learns them.

use std::collections::HashMap;

/// Point values for behavioral event types
#[derive(Debug, Clone)]
pub struct ScoringRules {
    event_points: HashMap<String, i32>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        let mut event_points = HashMap::new();

        // Browsing behavior
        event_points.insert("viewed".to_string(), 5);
        event_points.insert("browsed".to_string(), 3);

        // Engagement actions
        event_points.insert("saved".to_string(), 15);
        event_points.insert("shared".to_string(), 10);

        // High-intent actions
        event_points.insert("inquiry".to_string(), 25);
        event_points.insert("application".to_string(), 50);
        event_points.insert("scheduled".to_string(), 30);

        // Conversion
        event_points.insert("converted".to_string(), 100);

        // Session engagement
        event_points.insert("session_start".to_string(), 2);
        event_points.insert("long_session".to_string(), 5);

        // Email engagement (from CRM webhooks)
        event_points.insert("email_opened".to_string(), 3);
        event_points.insert("email_clicked".to_string(), 10);

        // Negative signals
        event_points.insert("unsubscribed".to_string(), -20);

        Self { event_points }
    }
}

impl ScoringRules {
    /// Point value for an event type; unknown types score zero
    pub fn points_for(&self, event_type: &str) -> i32 {
        self.event_points.get(event_type).copied().unwrap_or(0)
    }

    /// Customize the point value for an event type
    pub fn set_points(&mut self, event_type: impl Into<String>, points: i32) {
        self.event_points.insert(event_type.into(), points);
    }
}
