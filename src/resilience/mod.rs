//! # Resilience Module
//!
//! Fault-tolerance primitives for outbound calls to the CRM and the
//! property ledger. The retry executor is shared by every outbound path:
//! sync-queue processing, full-sync passes, and best-effort side-effects
//! fired from state-transition handlers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rentflow_core::resilience::retry::{RemoteResponse, RetryConfig, RetryPolicy};
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! let response = policy
//!     .execute(shutdown_rx, || async {
//!         // remote call here
//!         Ok(RemoteResponse::ok(serde_json::json!({})))
//!     })
//!     .await?;
//! assert!(response.is_success());
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{FailureKind, RemoteError, RemoteResponse, RetryConfig, RetryError, RetryPolicy};
