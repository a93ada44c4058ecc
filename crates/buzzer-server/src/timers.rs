//! Armed phase timers.

use tokio::task::JoinHandle;

/// Handles of the sleeping timer tasks for the current schedule.
///
/// Cancelling aborts every task. A task that already woke and is waiting
/// for the controller lock may still deliver its event; the controller
/// drops it by token.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Vec<JoinHandle<()>>,
}

impl TimerSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly spawned timer task.
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    /// Abort all pending timers. Returns how many were still pending.
    pub fn cancel_all(&mut self) -> usize {
        let pending = self.handles.iter().filter(|h| !h.is_finished()).count();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        pending
    }

    /// Number of timers that have not fired yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn cancelled_timer_never_runs() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut timers = TimerSet::new();

        let flag = Arc::clone(&fired);
        timers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        }));
        assert_eq!(timers.pending(), 1);

        assert_eq!(timers.cancel_all(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test]
    async fn finished_timers_are_not_pending() {
        let mut timers = TimerSet::new();
        timers.push(tokio::spawn(async {}));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(timers.pending(), 0);
        assert_eq!(timers.cancel_all(), 0);
    }
}
