//! Buzzer competition controller core.
//!
//! Pure logic for a "first device to signal wins" competition. Buzzer
//! devices register, wait through a countdown, then race to signal; a
//! moderator drives the round; spectators watch a live feed.
//!
//! # Architecture
//!
//! Everything here is Sans-IO. The [`Controller`] takes
//! [`ControllerEvent`]s (device requests, moderator commands, fired timers)
//! and returns [`ControllerAction`]s (replies, timer arm/cancel, feed
//! pushes). Drivers own the sockets and timers:
//!
//! - `buzzer-server`: tokio + axum production runtime
//! - `buzzer-harness`: virtual-time simulation for tests
//!
//! # Components
//!
//! - [`ClockSync`]: controller epoch; answers device clock queries
//! - [`Registry`]: append-only participant table with per-round outcomes
//! - [`PhaseMachine`]: Idle → Countdown → Open → Closed, plus Paused
//! - [`Arbiter`]: one validated answer per participant per round
//! - [`LiveSnapshot`] / [`ConfigSnapshot`]: feed payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod arbiter;
pub mod clock;
pub mod controller;
pub mod env;
pub mod error;
pub mod phase;
pub mod registry;
pub mod snapshot;

pub use arbiter::{Answer, Arbiter, DEFAULT_CLOCK_TOLERANCE_MS, RejectReason, Verdict};
pub use clock::{ClockSync, Millis};
pub use controller::{
    ControlCommand, Controller, ControllerAction, ControllerConfig, ControllerEvent,
};
pub use env::Environment;
pub use error::ControllerError;
pub use phase::{
    DEFAULT_COUNTDOWN_MS, DEFAULT_OPEN_MS, Phase, PhaseMachine, PhaseTimer, ScheduledTimer,
    TimerToken,
};
pub use registry::{MAX_PARTICIPANTS, Participant, Registry, UNANSWERED};
pub use snapshot::{ConfigSnapshot, LiveSnapshot};
