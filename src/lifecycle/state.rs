//! Process lifecycle state machine.
//!
//! ```text
//! Starting ──▶ Listening ──▶ Draining ──▶ Stopped
//!     └──────────────────────────────────────▲
//! ```
//!
//! Transitions only move forward; `Stopped` is terminal. The current state
//! is published through a watch channel so handlers (`/ready`) and the
//! drain logic observe it without locking.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Shared lifecycle handle.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
    started_at: Instant,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self {
            tx,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move to `next`. Fails unless `next` is strictly after the current state.
    pub fn transition(&self, next: LifecycleState) -> Result<(), TransitionError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| {
            if next > *current {
                tracing::debug!(from = %current, to = %next, "Lifecycle transition");
                *current = next;
                true
            } else {
                result = Err(TransitionError {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Resolve once the state has reached (or passed) `target`.
    pub async fn reached(&self, target: LifecycleState) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state >= target).await;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Listening
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_forward_through_all_states() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Starting);
        assert!(!lifecycle.is_ready());

        lifecycle.transition(LifecycleState::Listening).unwrap();
        assert!(lifecycle.is_ready());

        lifecycle.transition(LifecycleState::Draining).unwrap();
        assert!(!lifecycle.is_ready());

        lifecycle.transition(LifecycleState::Stopped).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn stopped_is_terminal() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Stopped).unwrap();

        let err = lifecycle.transition(LifecycleState::Listening).unwrap_err();
        assert_eq!(err.from, LifecycleState::Stopped);
        assert_eq!(err.to, LifecycleState::Listening);
        assert!(lifecycle.transition(LifecycleState::Stopped).is_err());
    }

    #[test]
    fn cannot_go_backwards() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Draining).unwrap();
        assert!(lifecycle.transition(LifecycleState::Listening).is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Draining);
    }

    #[tokio::test]
    async fn reached_wakes_on_transition() {
        let lifecycle = std::sync::Arc::new(Lifecycle::new());
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.reached(LifecycleState::Draining).await })
        };

        lifecycle.transition(LifecycleState::Listening).unwrap();
        lifecycle.transition(LifecycleState::Draining).unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
