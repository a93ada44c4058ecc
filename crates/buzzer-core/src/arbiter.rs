//! Answer arbitration.
//!
//! Decides whether an incoming answer is admitted and what outcome to record
//! for it. Devices report their own estimate of the controller clock (synced
//! earlier via a clock query); that estimate is trusted only when it agrees
//! with the controller's receipt time within a tolerance. Otherwise the
//! receipt time is used and the device is told so.
//!
//! Outcomes are measured against the instant answering opens:
//!
//! ```text
//!   countdown          │ open
//! ─────────────────────┼────────────────────>
//!      -2000 (foul)    0     +500 (valid)
//!                      open_starts_at
//! ```

use buzzer_proto::{AnswerCode, ParticipantId};

use crate::{
    clock::Millis,
    phase::{Phase, PhaseMachine},
    registry::Registry,
};

/// Default clock tolerance.
pub const DEFAULT_CLOCK_TOLERANCE_MS: u64 = 30;

/// An answer as received by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer {
    /// Answering participant
    pub id: ParticipantId,
    /// Device-reported elapsed ms since epoch
    pub device_elapsed_ms: Millis,
    /// Controller receipt time, ms since epoch
    pub server_elapsed_ms: Millis,
}

/// Why an answer was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Round not in countdown or open
    NotOpen(Phase),
    /// Id was never registered
    UnknownParticipant,
    /// Participant already has an outcome this round
    AlreadyAnswered,
}

/// Arbitration result for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Outcome recorded
    Accepted {
        /// Recorded outcome
        outcome: i64,
        /// Controller receipt time replaced the device timestamp
        clock_adjusted: bool,
    },
    /// Nothing recorded
    Rejected(RejectReason),
}

impl Verdict {
    /// Reply code sent back to the device.
    pub fn code(&self) -> AnswerCode {
        match self {
            Self::Accepted { clock_adjusted: false, .. } => AnswerCode::Accepted,
            Self::Accepted { clock_adjusted: true, .. } => AnswerCode::AcceptedClockAdjusted,
            Self::Rejected(_) => AnswerCode::Rejected,
        }
    }
}

/// Validates and records answers.
#[derive(Debug, Clone)]
pub struct Arbiter {
    tolerance_ms: u64,
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_TOLERANCE_MS)
    }
}

impl Arbiter {
    /// Create an arbiter trusting device clocks within `tolerance_ms`.
    pub fn new(tolerance_ms: u64) -> Self {
        Self { tolerance_ms }
    }

    /// Current clock tolerance.
    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Replace the clock tolerance. Validation is the caller's job.
    pub fn set_tolerance_ms(&mut self, tolerance_ms: u64) {
        self.tolerance_ms = tolerance_ms;
    }

    /// Pick the timestamp an answer is scored from.
    ///
    /// Returns `(basis, clock_adjusted)`.
    pub fn reconcile(&self, device_elapsed_ms: Millis, server_elapsed_ms: Millis) -> (Millis, bool) {
        if device_elapsed_ms.abs_diff(server_elapsed_ms) <= self.tolerance_ms {
            (device_elapsed_ms, false)
        } else {
            (server_elapsed_ms, true)
        }
    }

    /// Admit and record one answer.
    ///
    /// At most one answer per participant is recorded per round; replays
    /// are rejected.
    pub fn submit(&self, phase: &PhaseMachine, registry: &mut Registry, answer: Answer) -> Verdict {
        let current = phase.phase();
        if !current.accepts_answers() {
            return Verdict::Rejected(RejectReason::NotOpen(current));
        }

        match registry.get(answer.id) {
            None => return Verdict::Rejected(RejectReason::UnknownParticipant),
            Some(participant) if participant.has_answered() => {
                return Verdict::Rejected(RejectReason::AlreadyAnswered);
            },
            Some(_) => {},
        }

        let (basis, clock_adjusted) =
            self.reconcile(answer.device_elapsed_ms, answer.server_elapsed_ms);
        let raw = basis as i64 - phase.open_starts_at() as i64;

        // Tolerance can put the basis on the other side of the boundary;
        // the phase the answer arrived in decides the sign. An early basis
        // in Open scores 1 so it never collides with UNANSWERED.
        let outcome = match current {
            Phase::Countdown => raw.min(-1),
            _ if raw < 0 => 1,
            _ => raw,
        };

        registry.record_outcome(answer.id, outcome);

        tracing::debug!(
            id = answer.id,
            outcome,
            clock_adjusted,
            device_ms = answer.device_elapsed_ms,
            server_ms = answer.server_elapsed_ms,
            "Answer recorded"
        );

        Verdict::Accepted { outcome, clock_adjusted }
    }
}
