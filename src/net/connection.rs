//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently inside the proxy pipeline
//! - Feed the in-flight gauge and the `/health` report

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counter of in-flight requests.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active: Arc<AtomicU64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request entering the pipeline. The guard decrements on drop,
    /// on every exit path.
    pub fn track(&self) -> InFlightGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Keeps one request counted while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts() {
        let tracker = InFlightTracker::new();
        assert_eq!(tracker.active(), 0);

        let a = tracker.track();
        let b = tracker.track();
        assert_eq!(tracker.active(), 2);

        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn clones_share_the_count() {
        let tracker = InFlightTracker::new();
        let view = tracker.clone();

        let guard = tracker.track();
        assert_eq!(view.active(), 1);
        drop(guard);
        assert_eq!(view.active(), 0);
    }

    #[tokio::test]
    async fn guard_released_when_task_is_cancelled() {
        let tracker = InFlightTracker::new();
        let task = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let _guard = tracker.track();
                std::future::pending::<()>().await;
            })
        };

        tokio::task::yield_now().await;
        while tracker.active() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;
        assert_eq!(tracker.active(), 0);
    }
}
