//! # Lifecycle State Machine
//!
//! Explicit lifecycle for components that own background tasks, replacing
//! ad hoc running flags. Transitions happen only through the
//! start/stop entry points via compare-exchange, so concurrent calls
//! cannot double-start or double-stop. A single long-lived watch channel
//! carries the shutdown signal: tasks select on it during every
//! suspension point, and the retry executor aborts its waits on it.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle states for a component with background tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Atomic lifecycle handle shared between a component and its tasks
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: AtomicU8::new(LifecycleState::Stopped as u8),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Claim the Stopped → Starting transition. Returns false when the
    /// component is already starting, running, or stopping; the caller
    /// treats that as a no-op.
    pub fn begin_start(&self) -> bool {
        let claimed = self
            .state
            .compare_exchange(
                LifecycleState::Stopped as u8,
                LifecycleState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            // Reset the signal so tasks spawned by this start don't observe
            // a stale shutdown from a previous cycle
            let _ = self.shutdown_tx.send(false);
        }
        claimed
    }

    /// Complete a claimed start
    pub fn complete_start(&self) {
        self.state
            .store(LifecycleState::Running as u8, Ordering::Release);
    }

    /// Claim the Running → Stopping transition and fire the shutdown
    /// signal. Returns false when not running.
    pub fn begin_stop(&self) -> bool {
        let claimed = self
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            let _ = self.shutdown_tx.send(true);
        }
        claimed
    }

    /// Complete a claimed stop
    pub fn complete_stop(&self) {
        self.state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
    }

    /// A receiver on the shutdown signal; true means shut down now
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_transition_claimed_once() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.begin_start());
        assert!(!lifecycle.begin_start(), "second start is a no-op");
        lifecycle.complete_start();
        assert!(lifecycle.is_running());
        assert!(!lifecycle.begin_start(), "start while running is a no-op");
    }

    #[test]
    fn test_stop_fires_shutdown_signal() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_start();
        lifecycle.complete_start();

        let rx = lifecycle.shutdown_signal();
        assert!(!*rx.borrow());

        assert!(lifecycle.begin_stop());
        assert!(*rx.borrow());
        lifecycle.complete_stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);

        assert!(!lifecycle.begin_stop(), "second stop is a no-op");
    }

    #[test]
    fn test_restart_resets_signal() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_start();
        lifecycle.complete_start();
        lifecycle.begin_stop();
        lifecycle.complete_stop();

        assert!(lifecycle.begin_start());
        assert!(!*lifecycle.shutdown_signal().borrow());
    }
}
