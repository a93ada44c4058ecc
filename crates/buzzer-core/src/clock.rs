//! Controller epoch and elapsed-time arithmetic.
//!
//! Every timestamp the controller deals with is expressed as milliseconds
//! since a single epoch captured when the controller is created. Devices
//! query this value to learn their offset and later report answer times on
//! the same scale.

use std::{ops::Sub, time::Duration};

/// Milliseconds elapsed since the controller epoch.
pub type Millis = u64;

/// The controller epoch.
#[derive(Debug, Clone, Copy)]
pub struct ClockSync<I> {
    epoch: I,
}

impl<I> ClockSync<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Fix the epoch at `epoch`.
    pub fn new(epoch: I) -> Self {
        Self { epoch }
    }

    /// Milliseconds from the epoch to `at`. Instants before the epoch map to 0.
    pub fn elapsed_ms(&self, at: I) -> Millis {
        if at <= self.epoch {
            return 0;
        }
        u64::try_from((at - self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    /// Answer a device clock query received at `received_at`.
    ///
    /// Uses receipt time rather than reply time so the device can subtract
    /// half its measured round trip. The wire field is 32 bits; values past
    /// ~49 days saturate.
    pub fn query_epoch(&self, received_at: I) -> u32 {
        u32::try_from(self.elapsed_ms(received_at)).unwrap_or(u32::MAX)
    }
}
