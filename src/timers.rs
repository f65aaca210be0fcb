//! Round-scoped timers for option reveals and auto-advance.
//!
//! Every timer belongs to the round that was current when it was scheduled.
//! Starting a new round aborts all of them, and a timer that still fires
//! checks the round number first and does nothing if it has been superseded.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct RoundTimers {
    current: Arc<AtomicU32>,
    handles: Vec<JoinHandle<()>>,
}

impl RoundTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel everything from the previous round and adopt `round`
    pub fn begin_round(&mut self, round: u32) {
        self.cancel_all();
        self.current.store(round, Ordering::SeqCst);
    }

    pub fn current_round(&self) -> u32 {
        self.current.load(Ordering::SeqCst)
    }

    /// Run `task` after `delay` unless the round changes first
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|h| !h.is_finished());

        let round = self.current_round();
        let current = self.current.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != round {
                tracing::debug!("Dropping stale timer for round {}", round);
                return;
            }
            task.await;
        });
        self.handles.push(handle);
    }

    pub fn cancel_all(&mut self) {
        let cancelled = self.handles.len();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        if cancelled > 0 {
            tracing::debug!("Cancelled {} timers", cancelled);
        }
    }

    /// Timers that have not fired or been cancelled yet
    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for RoundTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
