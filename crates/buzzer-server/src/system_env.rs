//! Production Environment implementation using system time.
//!
//! `SystemEnv` is the production implementation of the Environment trait:
//! `std::time::Instant` for the monotonic clock and tokio sleeps for phase
//! timers. Timing is therefore real wall-clock behaviour and not
//! reproducible; deterministic tests use the harness environments instead.

use std::time::Duration;

use buzzer_core::Environment;

/// Production environment using the system monotonic clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
