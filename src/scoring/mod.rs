//! # Behavioral Scoring
//!
//! Computes a composite 0–100 engagement score per lead from a
//! time-decayed event history, detects segment transitions, and raises a
//! hot-lead alert exactly once per transition into the hot segment.
//!
//! ## Architecture
//!
//! - [`ScoringRules`]: base-point table per behavioral event type
//! - [`ScoringEngine`]: component/composite math, upsert with
//!   transition detection, per-lead write serialization
//! - [`BehaviorTracker`]: event ingestion (`track_event`) with
//!   asynchronous recalculation and engagement-spike detection
//!
//! Recalculations for the same lead are serialized through a per-lead
//! async mutex: reading the previous segment and overwriting it must be
//! atomic, or two concurrent recalculations could both observe a non-hot
//! "previous" segment and double-fire the alert.

pub mod engine;
pub mod rules;
pub mod tracker;

pub use engine::ScoringEngine;
pub use rules::ScoringRules;
pub use tracker::BehaviorTracker;
