//! # Bounded Retry with Jittered Exponential Backoff
//!
//! Generic retry executor for remote operations. Transport errors are
//! always retryable; completed responses are retryable only when their
//! status code is in the configured set. Delays grow exponentially with
//! ±10% symmetric jitter so concurrent callers never synchronize, and a
//! `Retry-After` hint on 429/503 responses overrides the computed delay.
//! Waits are interruptible: a shutdown signal aborts the wait immediately
//! with a cancellation error, distinct from retry exhaustion.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Configuration for the retry executor
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl From<&crate::config::RetrySettings> for RetryConfig {
    fn from(settings: &crate::config::RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_factor: settings.backoff_factor,
            retryable_statuses: settings.retryable_statuses.clone(),
        }
    }
}

/// A completed remote response, status plus parsed body. Wire formats are
/// collaborator detail; only the status code and the `Retry-After` hint
/// matter to the retry logic.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Value,
}

impl RemoteResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body,
        }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self {
            status,
            retry_after: None,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure; always retryable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// The last failure observed before exhaustion
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Transport(String),
    Status(u16),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport(msg) => write!(f, "transport: {msg}"),
            FailureKind::Status(status) => write!(f, "status {status}"),
        }
    }
}

/// Errors surfaced by [`RetryPolicy::execute`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError {
    /// The wait between attempts was interrupted by shutdown
    #[error("retry wait cancelled by shutdown")]
    Cancelled,

    /// Every attempt failed; carries the last observed failure
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: FailureKind },
}

/// Bounded-retry executor. One instance is shared across concurrent
/// callers; each call owns its attempt state.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` up to `max_retries + 1` times.
    ///
    /// Returns the first non-retryable response (including 4xx failures:
    /// classifying those is the caller's concern), `RetryError::Cancelled`
    /// if the shutdown signal fires during a wait, or
    /// `RetryError::Exhausted` carrying the last failure.
    pub async fn execute<F, Fut>(
        &self,
        mut shutdown: watch::Receiver<bool>,
        mut operation: F,
    ) -> Result<RemoteResponse, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<RemoteResponse, RemoteError>>,
    {
        let mut last_failure = FailureKind::Transport("no attempts made".to_string());

        for attempt in 0..=self.config.max_retries {
            let mut retry_after_hint = None;

            match operation().await {
                Ok(response) => {
                    if !self.is_retryable_status(response.status) {
                        return Ok(response);
                    }

                    debug!(
                        status = response.status,
                        attempt = attempt,
                        "🔁 Retryable response status"
                    );

                    // Only 429/503 carry an authoritative server hint
                    if matches!(response.status, 429 | 503) {
                        retry_after_hint = response
                            .retry_after
                            .as_deref()
                            .and_then(parse_retry_after);
                    }
                    last_failure = FailureKind::Status(response.status);
                }
                Err(err) => {
                    warn!(error = %err, attempt = attempt, "🔁 Transport error");
                    last_failure = FailureKind::Transport(err.to_string());
                }
            }

            if attempt < self.config.max_retries {
                let delay = match retry_after_hint {
                    Some(hint) => hint.min(self.config.max_delay),
                    None => self.backoff_delay(attempt),
                };
                self.wait(&mut shutdown, delay).await?;
            }
        }

        Err(RetryError::Exhausted {
            attempts: self.config.max_retries + 1,
            last: last_failure,
        })
    }

    fn is_retryable_status(&self, status: u16) -> bool {
        self.config.retryable_statuses.contains(&status)
    }

    /// `initial * factor^attempt`, capped, with ±10% symmetric jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.config.max_delay.as_secs_f64());
        let jitter = capped * 0.1 * (fastrand::f64() * 2.0 - 1.0);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }

    /// Sleep for `delay`, aborting immediately if shutdown fires
    async fn wait(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        delay: Duration,
    ) -> Result<(), RetryError> {
        if *shutdown.borrow_and_update() {
            return Err(RetryError::Cancelled);
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = shutdown.changed() => {
                    // A dropped sender means the owner is gone; treat as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(RetryError::Cancelled);
                    }
                }
            }
        }
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an HTTP-date
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let until = date.with_timezone(&Utc) - Utc::now();
    Some(Duration::from_secs(until.num_seconds().max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig::default())
    }

    fn shutdown_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_429s_then_success() {
        let (_tx, rx) = shutdown_pair();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let started = tokio::time::Instant::now();
        let result = policy()
            .execute(rx, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Ok(RemoteResponse::with_status(429, json!({})))
                    } else {
                        Ok(RemoteResponse::ok(json!({"ok": true})))
                    }
                }
            })
            .await
            .expect("should succeed on third attempt");

        assert_eq!(result.status, 200);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        // Exactly two delays: ~1s + ~2s with ±10% jitter each
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2700), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(3300), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_400_returns_without_retry() {
        let (_tx, rx) = shutdown_pair();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy()
            .execute(rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(RemoteResponse::with_status(400, json!({"error": "bad"}))) }
            })
            .await
            .expect("non-retryable status is returned, not retried");

        assert_eq!(result.status, 400);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_carries_last_failure() {
        let (_tx, rx) = shutdown_pair();

        let err = policy()
            .execute(rx, || async {
                Ok(RemoteResponse::with_status(503, json!({})))
            })
            .await
            .expect_err("all attempts fail");

        assert_eq!(
            err,
            RetryError::Exhausted {
                attempts: 4,
                last: FailureKind::Status(503),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retryable() {
        let (_tx, rx) = shutdown_pair();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy()
            .execute(rx, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RemoteError::Transport("connection reset".to_string()))
                    } else {
                        Ok(RemoteResponse::ok(json!({})))
                    }
                }
            })
            .await
            .expect("recovers after transport error");

        assert!(result.is_success());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let (_tx, rx) = shutdown_pair();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let started = tokio::time::Instant::now();
        let result = policy()
            .execute(rx, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(RemoteResponse {
                            status: 429,
                            retry_after: Some("5".to_string()),
                            body: json!({}),
                        })
                    } else {
                        Ok(RemoteResponse::ok(json!({})))
                    }
                }
            })
            .await
            .expect("succeeds on second attempt");

        assert!(result.is_success());
        // Server-specified 5s replaces the computed ~1s first delay
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_capped_at_max_delay() {
        let (_tx, rx) = shutdown_pair();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let started = tokio::time::Instant::now();
        let _ = policy()
            .execute(rx, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(RemoteResponse {
                            status: 429,
                            retry_after: Some("3600".to_string()),
                            body: json!({}),
                        })
                    } else {
                        Ok(RemoteResponse::ok(json!({})))
                    }
                }
            })
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed <= Duration::from_secs(31), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let (tx, rx) = shutdown_pair();

        let handle = tokio::spawn(async move {
            policy()
                .execute(rx, || async {
                    Ok(RemoteResponse::with_status(503, json!({})))
                })
                .await
        });

        // Let the first attempt complete and enter its wait
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).expect("receiver alive");

        let err = handle.await.expect("task").expect_err("cancelled");
        assert_eq!(err, RetryError::Cancelled);
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("not-a-date"), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let future = (Utc::now() + chrono::Duration::seconds(90)).to_rfc2822();
        let parsed = parse_retry_after(&future).expect("valid date");
        assert!(parsed >= Duration::from_secs(88) && parsed <= Duration::from_secs(91));

        // Dates in the past clamp to zero rather than underflowing
        let past = (Utc::now() - chrono::Duration::seconds(90)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), Some(Duration::ZERO));
    }
}
