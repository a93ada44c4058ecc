//! Fuzz target for the controller state machine
//!
//! Drives a full controller with arbitrary device requests, moderator
//! commands and clock movement (HIGH priority)
//!
//! # Strategy
//!
//! - Devices: register, clock queries, answers with near and far clocks
//! - Moderator: every command, including out-of-phase ones and zero values
//! - Time: small steps and jumps past both phase timers
//!
//! # Invariants
//!
//! - Every step invariant in the harness registry holds
//! - Ids are handed out densely
//! - Every answer gets exactly one reply

#![no_main]

use arbitrary::Arbitrary;
use buzzer_core::{ControlCommand, ControllerConfig};
use buzzer_harness::SimDriver;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Register,
    ClockQuery,
    Answer { id: u8, skew: i16 },
    Start,
    Reset,
    Pause,
    Resume,
    SetCountdown(u16),
    SetOpen(u16),
    SetTolerance(u8),
    SetName { id: u8, name: String },
    Advance(u16),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut sim = SimDriver::new(ControllerConfig {
        countdown_ms: 300,
        open_ms: 1_000,
        ..Default::default()
    });
    let mut registered = 0u32;

    for op in ops {
        match op {
            Op::Register => {
                if let Some(id) = sim.register() {
                    assert_eq!(id, registered);
                    registered += 1;
                }
            }
            Op::ClockQuery => {
                assert!(sim.query_clock().is_some());
            }
            Op::Answer { id, skew } => {
                let device = (sim.now_ms() as i64 + i64::from(skew)).max(0) as u32;
                assert!(sim.answer(u32::from(id), device).is_some());
            }
            Op::Start => {
                let _ = sim.command(ControlCommand::Start);
            }
            Op::Reset => {
                sim.command(ControlCommand::Reset).expect("reset never fails");
                assert!(sim.pending_timers().is_empty());
            }
            Op::Pause => {
                let _ = sim.command(ControlCommand::Pause);
            }
            Op::Resume => {
                let _ = sim.command(ControlCommand::Resume);
            }
            Op::SetCountdown(v) => {
                let _ = sim.command(ControlCommand::SetCountdownMs(v.into()));
            }
            Op::SetOpen(v) => {
                let _ = sim.command(ControlCommand::SetOpenMs(v.into()));
            }
            Op::SetTolerance(v) => {
                let _ = sim.command(ControlCommand::SetClockToleranceMs(v.into()));
            }
            Op::SetName { id, name } => {
                let _ = sim.command(ControlCommand::SetName { id: id.into(), name });
            }
            Op::Advance(ms) => {
                sim.advance(ms.into());
            }
        }
    }

    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
    assert_eq!(sim.controller().registry().len(), registered as usize);
});
