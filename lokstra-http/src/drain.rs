//! Shared shutdown/drain bookkeeping (spec §4.J): "(1) set shutting-down
//! flag; new requests get 503 with `Retry-After:5`; (2) stop accepting;
//! (3) wait for in-flight requests or the timeout, whichever first". All
//! three listener backends share one `DrainState` so their shutdown
//! behaviour is identical.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct DrainState {
    shutting_down: AtomicBool,
    active: AtomicUsize,
    accept_cancel: CancellationToken,
}

/// Held for the lifetime of one in-flight request; decrements the active
/// count on drop so the count is accurate even if the handler panics.
/// Owns its `Arc<DrainState>` so it can be moved into a spawned request
/// task.
pub struct RequestGuard {
    state: Arc<DrainState>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl DrainState {
    pub fn new() -> Arc<Self> {
        Arc::new(DrainState::default())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn active_requests(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Admit a request unless draining; returns `None` when the caller
    /// should respond 503 instead of dispatching to the router.
    pub fn try_enter(self: &Arc<Self>) -> Option<RequestGuard> {
        if self.is_shutting_down() {
            return None;
        }
        self.active.fetch_add(1, Ordering::AcqRel);
        Some(RequestGuard { state: self.clone() })
    }

    pub fn accept_cancel_token(&self) -> CancellationToken {
        self.accept_cancel.clone()
    }

    /// Begin shutdown: stop accepting, mark draining, then wait for
    /// in-flight requests to finish or `timeout` to elapse, whichever
    /// first.
    pub async fn begin_shutdown(&self, timeout: Duration) {
        self.shutting_down.store(true, Ordering::Release);
        self.accept_cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        while self.active_requests() > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.active_requests(),
                    "listener shutdown timed out with requests still in flight"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_enter_is_refused_once_draining() {
        let state = DrainState::new();
        let guard = state.try_enter().unwrap();
        assert_eq!(state.active_requests(), 1);
        drop(guard);
        assert_eq!(state.active_requests(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_requests_immediately() {
        let state = DrainState::new();
        let _guard = state.try_enter().unwrap();
        state.begin_shutdown(Duration::from_millis(5)).await;
        assert!(state.is_shutting_down());
        assert!(state.try_enter().is_none());
    }

    #[tokio::test]
    async fn shutdown_returns_as_soon_as_in_flight_requests_finish() {
        let state = DrainState::new();
        let guard = state.try_enter().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(guard);
        });
        let started = tokio::time::Instant::now();
        state.begin_shutdown(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
