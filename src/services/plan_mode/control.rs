//! Execution Control
//!
//! Cloneable pause/resume/cancel handle shared between a running executor and
//! whoever drives it. Pausing is a `watch` flag the run loop awaits between
//! steps; cancellation is a `CancellationToken`. Neither interrupts a step
//! that is already in flight.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ControlInner {
    paused: watch::Sender<bool>,
    /// Replaced on `reset` so a cancelled handle can be reused
    cancel: Mutex<CancellationToken>,
}

#[derive(Clone)]
pub struct ExecutionControl {
    inner: Arc<ControlInner>,
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionControl")
            .field("paused", &self.is_paused())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl ExecutionControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlInner {
                paused,
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Hold the run loop before its next step.
    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
        debug!("Execution paused");
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
        debug!("Execution resumed");
    }

    /// Stop before the next step, including while paused.
    pub fn cancel(&self) {
        self.token().cancel();
        debug!("Execution cancelled");
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token().is_cancelled()
    }

    /// Clear both flags for a new run.
    pub fn reset(&self) {
        self.inner.paused.send_replace(false);
        if let Ok(mut token) = self.inner.cancel.lock() {
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
        }
    }

    pub fn token(&self) -> CancellationToken {
        match self.inner.cancel.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Wait until not paused. Returns `false` if cancelled first.
    pub async fn wait_until_runnable(&self) -> bool {
        let token = self.token();
        let mut paused = self.inner.paused.subscribe();
        loop {
            if token.is_cancelled() {
                return false;
            }
            if !*paused.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = token.cancelled() => return false,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return !token.is_cancelled();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runnable_when_idle() {
        let control = ExecutionControl::new();
        assert!(control.wait_until_runnable().await);
    }

    #[tokio::test]
    async fn test_resume_releases_waiter() {
        let control = ExecutionControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_until_runnable().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        control.resume();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_releases_paused_waiter() {
        let control = ExecutionControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_until_runnable().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[test]
    fn test_reset_clears_flags() {
        let control = ExecutionControl::new();
        control.pause();
        control.cancel();
        assert!(control.is_paused() && control.is_cancelled());
        control.reset();
        assert!(!control.is_paused());
        assert!(!control.is_cancelled());
    }
}
