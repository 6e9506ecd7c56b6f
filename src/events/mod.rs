//! # Event Processing
//!
//! Turns raw domain rows (price changes, behavioral bursts, finished
//! showings) into canonical triggers the orchestrator can act on.
//!
//! ## Architecture
//!
//! - [`CanonicalTrigger`]: normalized business events, independent of the
//!   table they were detected in
//! - [`TriggerSink`]: where surviving triggers are handed off (implemented
//!   by the integration orchestrator)
//! - [`EventProcessor`]: the periodic sweeps that detect, dedupe, and emit

pub mod processor;
pub mod triggers;

pub use processor::EventProcessor;
pub use triggers::{CanonicalTrigger, TriggerSink};
