//! Round phase state machine.
//!
//! Pure state machine: methods take the current time (ms since epoch) as
//! input and return the timers the driver must arm. No I/O, no clock access.
//!
//! # State Machine
//!
//! ```text
//!            start              timer A               timer B
//! ┌──────┐ ─────────> ┌───────────┐ ──────> ┌──────┐ ──────> ┌────────┐
//! │ Idle │            │ Countdown │         │ Open │         │ Closed │
//! └──────┘ <───┐      └───────────┘         └──────┘         └────────┘
//!              │          │    ^              │  ^               │
//!              │     pause│    │resume   pause│  │resume         │ start
//!              │          v    │              v  │               v
//!              │        ┌──────────────────────────┐        (Countdown)
//!              └────────│          Paused          │
//!                reset  └──────────────────────────┘
//! ```
//!
//! `reset` returns to Idle from every phase.
//!
//! # Timers
//!
//! Every schedule carries a [`TimerToken`]. Any transition that invalidates
//! pending timers (pause, reset, a new start) advances the token, and
//! [`PhaseMachine::on_timer`] ignores callbacks holding an older token or
//! arriving in a phase they no longer apply to. A driver that loses the race
//! between a firing timer and its cancellation therefore cannot move the
//! machine.

use std::fmt;

use serde::Serialize;

use crate::{clock::Millis, error::ControllerError};

/// Default countdown length (t1).
pub const DEFAULT_COUNTDOWN_MS: u64 = 3_000;

/// Default answering window length (t2).
pub const DEFAULT_OPEN_MS: u64 = 10_000;

/// Competition phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for a round; registration open
    Idle,
    /// Round started, answers count as fouls
    Countdown,
    /// Answers are scored
    Open,
    /// Round over
    Closed,
    /// Round suspended by the moderator
    Paused,
}

impl Phase {
    /// Lowercase name, as used in logs and feeds.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Countdown => "countdown",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Paused => "paused",
        }
    }

    /// Devices may register only while idle.
    pub fn accepts_registration(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Answers are taken during countdown (as fouls) and open.
    pub fn accepts_answers(self) -> bool {
        matches!(self, Self::Countdown | Self::Open)
    }

    /// Round parameters may change only between rounds.
    pub fn is_configurable(self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two timers a round uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseTimer {
    /// Timer A: countdown ends, answering opens
    Open,
    /// Timer B: answering window ends
    Close,
}

/// Generation stamp shared by all timers of one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Raw generation number.
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// A timer the driver must arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    /// Which transition fires
    pub timer: PhaseTimer,
    /// Token to hand back when it fires
    pub token: TimerToken,
    /// Absolute fire time, ms since epoch
    pub fire_at: Millis,
}

/// Phase state machine with round timing.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    countdown_ms: u64,
    open_ms: u64,
    open_starts_at: Millis,
    round_ends_at: Millis,
    elapsed_at_pause: u64,
    generation: u64,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_MS, DEFAULT_OPEN_MS)
    }
}

impl PhaseMachine {
    /// Create an idle machine with the given round parameters.
    ///
    /// Zero durations are raised to 1 ms; callers validate user input
    /// through the setters.
    pub fn new(countdown_ms: u64, open_ms: u64) -> Self {
        Self {
            phase: Phase::Idle,
            countdown_ms: countdown_ms.max(1),
            open_ms: open_ms.max(1),
            open_starts_at: 0,
            round_ends_at: 0,
            elapsed_at_pause: 0,
            generation: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Countdown length (t1).
    pub fn countdown_ms(&self) -> u64 {
        self.countdown_ms
    }

    /// Answering window length (t2).
    pub fn open_ms(&self) -> u64 {
        self.open_ms
    }

    /// Instant answering opens (or opened), ms since epoch.
    pub fn open_starts_at(&self) -> Millis {
        self.open_starts_at
    }

    /// Instant the round ends, ms since epoch.
    pub fn round_ends_at(&self) -> Millis {
        self.round_ends_at
    }

    /// Round time consumed before the last pause.
    pub fn elapsed_at_pause(&self) -> u64 {
        self.elapsed_at_pause
    }

    /// Token of the currently valid timer schedule.
    pub fn current_token(&self) -> TimerToken {
        TimerToken(self.generation)
    }

    fn round_len(&self) -> u64 {
        self.countdown_ms + self.open_ms
    }

    /// Invalidate every outstanding timer.
    fn cancel_timers(&mut self) {
        self.generation += 1;
    }

    fn invalid(&self, operation: &'static str) -> ControllerError {
        ControllerError::InvalidTransition { phase: self.phase, operation }
    }

    /// Begin a round: Idle/Closed → Countdown.
    ///
    /// Returns timers A and B. Clearing outcomes is the caller's job.
    pub fn start(&mut self, now: Millis) -> Result<Vec<ScheduledTimer>, ControllerError> {
        if !self.phase.is_configurable() {
            return Err(self.invalid("start"));
        }

        self.cancel_timers();
        self.phase = Phase::Countdown;
        self.elapsed_at_pause = 0;
        self.open_starts_at = now + self.countdown_ms;
        self.round_ends_at = self.open_starts_at + self.open_ms;

        let token = self.current_token();
        Ok(vec![
            ScheduledTimer { timer: PhaseTimer::Open, token, fire_at: self.open_starts_at },
            ScheduledTimer { timer: PhaseTimer::Close, token, fire_at: self.round_ends_at },
        ])
    }

    /// Round time consumed at `now`, clamped to the round length.
    pub fn elapsed_in_round(&self, now: Millis) -> u64 {
        let round_start = self.open_starts_at.saturating_sub(self.countdown_ms);
        now.saturating_sub(round_start).min(self.round_len())
    }

    /// Suspend a running round: Countdown/Open → Paused.
    pub fn pause(&mut self, now: Millis) -> Result<(), ControllerError> {
        if !self.phase.accepts_answers() {
            return Err(self.invalid("pause"));
        }

        self.cancel_timers();
        self.elapsed_at_pause = self.elapsed_in_round(now);
        self.phase = Phase::Paused;
        Ok(())
    }

    /// Continue a paused round: Paused → Countdown or Open.
    ///
    /// Both milestones are shifted by the time spent paused, so outcomes
    /// measured against `open_starts_at` exclude the pause.
    pub fn resume(&mut self, now: Millis) -> Result<Vec<ScheduledTimer>, ControllerError> {
        if self.phase != Phase::Paused {
            return Err(self.invalid("resume"));
        }

        let elapsed = self.elapsed_at_pause;
        self.open_starts_at = (now + self.countdown_ms).saturating_sub(elapsed);
        self.round_ends_at = (now + self.round_len()).saturating_sub(elapsed);

        let token = self.current_token();
        let mut timers = Vec::with_capacity(2);

        if elapsed < self.countdown_ms {
            self.phase = Phase::Countdown;
            timers.push(ScheduledTimer {
                timer: PhaseTimer::Open,
                token,
                fire_at: self.open_starts_at,
            });
        } else {
            self.phase = Phase::Open;
        }

        timers.push(ScheduledTimer { timer: PhaseTimer::Close, token, fire_at: self.round_ends_at });
        Ok(timers)
    }

    /// Return to Idle from any phase, cancelling timers.
    pub fn reset(&mut self) {
        self.cancel_timers();
        self.phase = Phase::Idle;
        self.elapsed_at_pause = 0;
    }

    /// Change the countdown length (Idle/Closed only).
    pub fn set_countdown_ms(&mut self, value: u64) -> Result<(), ControllerError> {
        self.check_parameter("countdown_ms", value)?;
        self.countdown_ms = value;
        Ok(())
    }

    /// Change the answering window length (Idle/Closed only).
    pub fn set_open_ms(&mut self, value: u64) -> Result<(), ControllerError> {
        self.check_parameter("open_ms", value)?;
        self.open_ms = value;
        Ok(())
    }

    /// Phase gate and positivity check shared by every tunable.
    pub(crate) fn check_parameter(
        &self,
        name: &'static str,
        value: u64,
    ) -> Result<(), ControllerError> {
        if !self.phase.is_configurable() {
            return Err(self.invalid(name));
        }
        if value == 0 {
            return Err(ControllerError::InvalidParameter { name, value });
        }
        Ok(())
    }

    /// Apply a fired timer.
    ///
    /// Returns the new phase, or `None` if the timer is stale (older token)
    /// or the machine is no longer in the phase the timer leaves.
    pub fn on_timer(&mut self, timer: PhaseTimer, token: TimerToken) -> Option<Phase> {
        if token != self.current_token() {
            return None;
        }

        let next = match (timer, self.phase) {
            (PhaseTimer::Open, Phase::Countdown) => Phase::Open,
            // B can overtake a late A; closing from countdown is still correct
            (PhaseTimer::Close, Phase::Countdown | Phase::Open) => Phase::Closed,
            _ => return None,
        };

        self.phase = next;
        Some(next)
    }

    /// Absolute instant of the next scheduled transition.
    ///
    /// While paused this is where the next transition would land if the
    /// round were resumed at `now`.
    pub fn next_milestone(&self, now: Millis) -> Option<Millis> {
        match self.phase {
            Phase::Countdown => Some(self.open_starts_at),
            Phase::Open => Some(self.round_ends_at),
            Phase::Paused if self.elapsed_at_pause < self.countdown_ms => {
                Some(now + (self.countdown_ms - self.elapsed_at_pause))
            },
            Phase::Paused => Some(now + (self.round_len() - self.elapsed_at_pause)),
            Phase::Idle | Phase::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(now: Millis) -> (PhaseMachine, Vec<ScheduledTimer>) {
        let mut machine = PhaseMachine::new(3_000, 10_000);
        let timers = machine.start(now).unwrap();
        (machine, timers)
    }

    #[test]
    fn start_schedules_both_timers() {
        let (machine, timers) = started(1_000);

        assert_eq!(machine.phase(), Phase::Countdown);
        assert_eq!(machine.open_starts_at(), 4_000);
        assert_eq!(machine.round_ends_at(), 14_000);
        assert_eq!(timers.len(), 2);
        assert_eq!(timers[0].timer, PhaseTimer::Open);
        assert_eq!(timers[0].fire_at, 4_000);
        assert_eq!(timers[1].timer, PhaseTimer::Close);
        assert_eq!(timers[1].fire_at, 14_000);
        assert_eq!(timers[0].token, machine.current_token());
    }

    #[test]
    fn timers_drive_countdown_open_closed() {
        let (mut machine, timers) = started(0);

        assert_eq!(machine.on_timer(PhaseTimer::Open, timers[0].token), Some(Phase::Open));
        assert_eq!(machine.on_timer(PhaseTimer::Close, timers[1].token), Some(Phase::Closed));
        assert_eq!(machine.next_milestone(20_000), None);
    }

    #[test]
    fn start_rejected_while_running() {
        let (mut machine, _) = started(0);

        let err = machine.start(10).unwrap_err();
        assert_eq!(
            err,
            ControllerError::InvalidTransition { phase: Phase::Countdown, operation: "start" }
        );
        assert_eq!(machine.phase(), Phase::Countdown);
    }

    #[test]
    fn restart_from_closed() {
        let (mut machine, timers) = started(0);
        machine.on_timer(PhaseTimer::Open, timers[0].token);
        machine.on_timer(PhaseTimer::Close, timers[1].token);

        let timers = machine.start(20_000).unwrap();
        assert_eq!(machine.phase(), Phase::Countdown);
        assert_eq!(timers[0].fire_at, 23_000);
    }

    #[test]
    fn pause_invalidates_pending_timers() {
        let (mut machine, timers) = started(0);

        machine.pause(1_000).unwrap();
        assert_eq!(machine.phase(), Phase::Paused);
        assert_eq!(machine.elapsed_at_pause(), 1_000);

        assert_eq!(machine.on_timer(PhaseTimer::Open, timers[0].token), None);
        assert_eq!(machine.phase(), Phase::Paused);
    }

    #[test]
    fn resume_during_countdown_rearms_both() {
        let (mut machine, _) = started(0);
        machine.pause(1_000).unwrap();

        let timers = machine.resume(5_000).unwrap();
        assert_eq!(machine.phase(), Phase::Countdown);
        assert_eq!(machine.open_starts_at(), 7_000);
        assert_eq!(machine.round_ends_at(), 17_000);
        assert_eq!(timers.len(), 2);
        assert_eq!(timers[0].fire_at, 7_000);
        assert_eq!(timers[1].fire_at, 17_000);
    }

    #[test]
    fn resume_during_open_rearms_close_only() {
        let (mut machine, timers) = started(0);
        machine.on_timer(PhaseTimer::Open, timers[0].token);
        machine.pause(5_000).unwrap();
        assert_eq!(machine.elapsed_at_pause(), 5_000);

        let timers = machine.resume(9_000).unwrap();
        assert_eq!(machine.phase(), Phase::Open);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].timer, PhaseTimer::Close);
        assert_eq!(timers[0].fire_at, 17_000);
        assert_eq!(machine.open_starts_at(), 7_000);
    }

    #[test]
    fn immediate_resume_keeps_schedule() {
        let (mut machine, _) = started(100);
        let (open, close) = (machine.open_starts_at(), machine.round_ends_at());

        machine.pause(1_234).unwrap();
        machine.resume(1_234).unwrap();

        assert_eq!(machine.open_starts_at(), open);
        assert_eq!(machine.round_ends_at(), close);
    }

    #[test]
    fn paused_milestone_projects_from_now() {
        let (mut machine, _) = started(0);
        machine.pause(1_000).unwrap();

        assert_eq!(machine.next_milestone(50_000), Some(52_000));
    }

    #[test]
    fn reset_from_any_phase() {
        let (mut machine, timers) = started(0);
        machine.pause(500).unwrap();
        machine.reset();

        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(machine.on_timer(PhaseTimer::Close, timers[1].token), None);

        let (mut machine, timers) = started(0);
        machine.reset();
        assert_eq!(machine.on_timer(PhaseTimer::Open, timers[0].token), None);
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn parameters_locked_while_running() {
        let (mut machine, _) = started(0);

        assert!(matches!(
            machine.set_countdown_ms(500),
            Err(ControllerError::InvalidTransition { .. })
        ));
        assert_eq!(machine.countdown_ms(), 3_000);
    }

    #[test]
    fn parameters_must_be_positive() {
        let mut machine = PhaseMachine::default();

        assert_eq!(
            machine.set_open_ms(0),
            Err(ControllerError::InvalidParameter { name: "open_ms", value: 0 })
        );
        machine.set_open_ms(2_500).unwrap();
        assert_eq!(machine.open_ms(), 2_500);
    }

    #[test]
    fn late_open_timer_after_close_is_ignored() {
        let (mut machine, timers) = started(0);

        assert_eq!(machine.on_timer(PhaseTimer::Close, timers[1].token), Some(Phase::Closed));
        assert_eq!(machine.on_timer(PhaseTimer::Open, timers[0].token), None);
        assert_eq!(machine.phase(), Phase::Closed);
    }
}
