//! # Notification Seam
//!
//! The integration core raises operational alerts (hot leads, engagement
//! spikes, emergency maintenance) but never renders or delivers them;
//! content generation and delivery channels live behind this trait.
//! Implementations must be cheap to call: delivery is expected to be
//! fire-and-forget on the implementor's side.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Sink for operational alerts raised by the integration core
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A lead crossed into the hot segment
    async fn hot_lead_alert(&self, lead_id: i64, lead_name: &str, composite_score: i32)
        -> Result<()>;

    /// A lead's composite score jumped by `delta` in one recalculation
    async fn engagement_spike(&self, lead_id: i64, delta: i32, composite_score: i32) -> Result<()>;

    /// A targeted alert for an operator audience ("admin", "owner", ...)
    async fn agent_alert(&self, audience: &str, title: &str, body: &str, meta: Value)
        -> Result<()>;
}

/// No-op notifier for deployments without an alerting channel
#[derive(Debug, Default, Clone)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn hot_lead_alert(
        &self,
        lead_id: i64,
        lead_name: &str,
        composite_score: i32,
    ) -> Result<()> {
        tracing::debug!(
            lead_id = lead_id,
            lead_name = %lead_name,
            score = composite_score,
            "hot lead alert dropped (no notifier configured)"
        );
        Ok(())
    }

    async fn engagement_spike(&self, _lead_id: i64, _delta: i32, _composite_score: i32) -> Result<()> {
        Ok(())
    }

    async fn agent_alert(&self, _audience: &str, _title: &str, _body: &str, _meta: Value) -> Result<()> {
        Ok(())
    }
}
