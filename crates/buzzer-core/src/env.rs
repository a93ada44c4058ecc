//! Environment abstraction for deterministic testing.
//!
//! Decouples controller logic from the system clock. Production uses
//! `std::time::Instant` and tokio sleeps; the simulation harness uses a
//! virtual clock it advances by hand, so round timing can be tested to the
//! millisecond.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - Methods are infallible
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only used by drivers to wait for phase timers, never by the controller
    /// itself.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
