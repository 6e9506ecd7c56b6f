//! # Behavioral Events and Scores
//!
//! Append-only behavioral facts observed against a lead, and the single
//! live score row derived from them.
//!
//! `BehavioralEvent` rows are never mutated or deleted. `BehavioralScore`
//! is the one entity with upsert semantics, keyed by `lead_id`; the cached
//! `segment` column exists for fast dashboard reads and is always derived
//! from `composite_score` via [`Segment::from_score`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;

/// An immutable behavioral fact: something a lead did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BehavioralEvent {
    pub id: i64,
    pub lead_id: i64,
    pub event_type: String,
    pub property_id: Option<i64>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// New behavioral event for insertion (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBehavioralEvent {
    pub lead_id: i64,
    pub event_type: String,
    pub property_id: Option<i64>,
    pub payload: Value,
}

/// Discrete engagement bucket derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Hot,
    Warm,
    Cold,
    Dormant,
}

impl Segment {
    /// Pure mapping from composite score to segment
    pub fn from_score(composite_score: i32) -> Self {
        if composite_score >= 70 {
            Segment::Hot
        } else if composite_score >= 40 {
            Segment::Warm
        } else if composite_score >= 10 {
            Segment::Cold
        } else {
            Segment::Dormant
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Hot => write!(f, "hot"),
            Segment::Warm => write!(f, "warm"),
            Segment::Cold => write!(f, "cold"),
            Segment::Dormant => write!(f, "dormant"),
        }
    }
}

impl std::str::FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(Segment::Hot),
            "warm" => Ok(Segment::Warm),
            "cold" => Ok(Segment::Cold),
            "dormant" => Ok(Segment::Dormant),
            _ => Err(format!("Invalid segment: {s}")),
        }
    }
}

/// Current behavioral score for a lead. At most one live row per lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralScore {
    pub id: i64,
    pub lead_id: i64,
    pub urgency_score: i32,
    pub engagement_score: i32,
    pub financial_score: i32,
    pub composite_score: i32,
    pub segment: Segment,
    pub score_factors: Value,
    pub last_calculated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BehavioralScore {
    pub fn segment(&self) -> Segment {
        Segment::from_score(self.composite_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(Segment::from_score(100), Segment::Hot);
        assert_eq!(Segment::from_score(70), Segment::Hot);
        assert_eq!(Segment::from_score(69), Segment::Warm);
        assert_eq!(Segment::from_score(40), Segment::Warm);
        assert_eq!(Segment::from_score(39), Segment::Cold);
        assert_eq!(Segment::from_score(10), Segment::Cold);
        assert_eq!(Segment::from_score(9), Segment::Dormant);
        assert_eq!(Segment::from_score(0), Segment::Dormant);
    }

    #[test]
    fn test_segment_string_conversion() {
        assert_eq!(Segment::Hot.to_string(), "hot");
        assert_eq!("dormant".parse::<Segment>().unwrap(), Segment::Dormant);
        assert!("scorching".parse::<Segment>().is_err());
    }
}
