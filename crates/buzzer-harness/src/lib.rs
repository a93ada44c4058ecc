//! Deterministic simulation harness for the buzzer controller.
//!
//! Two ways to drive a [`Controller`](buzzer_core::Controller) without real
//! time:
//!
//! - [`SimDriver`]: single-threaded stepping over a hand-advanced clock.
//!   Timers fire in order as the clock passes them; every device reply and
//!   feed push is recorded.
//! - [`SimServer`]: the production device handler over turmoil's simulated
//!   TCP, with phase timers on turmoil's virtual tokio clock.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks transition properties (legal phase edges,
//! append-only registry, answer finality) between consecutive
//! [`RoundSnapshot`]s. [`SimDriver`] runs them after every step and keeps
//! the violations for the test to inspect.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    AnswerFinality, IdleHasNoOutcomes, Invariant, InvariantRegistry, InvariantResult,
    LegalPhaseTransition, RegistryAppendOnly, RoundSnapshot, Violation,
};
pub use sim_driver::SimDriver;
pub use sim_env::{SimEnv, TurmoilEnv};
pub use sim_server::SimServer;
