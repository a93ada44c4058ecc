//! Simulated environments.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use buzzer_core::Environment;

/// Environment with a hand-advanced clock.
///
/// Instants are durations since the simulation began. Clones share the
/// clock. `sleep` returns immediately without moving time; timers are
/// driven explicitly by [`SimDriver`](crate::SimDriver).
#[derive(Clone, Debug, Default)]
pub struct SimEnv {
    now_ms: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at `start_ms`.
    #[must_use]
    pub fn with_start(start_ms: u64) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(start_ms)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Current time in ms since the simulation began.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Environment on tokio's clock, which turmoil virtualizes inside a
/// simulation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TurmoilEnv;

impl Environment for TurmoilEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
