//! Built-in step invariants.

use buzzer_core::Phase;

use super::{Invariant, InvariantResult, RoundSnapshot, Violation};

fn violation(invariant: &'static str, message: String) -> InvariantResult {
    Err(Violation { invariant, message })
}

/// Only the documented phase edges occur.
///
/// Reset may land in Idle from anywhere. Countdown may go straight to
/// Closed when its open timer is overtaken by the close timer.
pub struct LegalPhaseTransition;

impl Invariant for LegalPhaseTransition {
    fn name(&self) -> &'static str {
        "legal_phase_transition"
    }

    fn check(&self, before: &RoundSnapshot, after: &RoundSnapshot) -> InvariantResult {
        use Phase::{Closed, Countdown, Idle, Open, Paused};

        let legal = matches!(
            (before.phase, after.phase),
            (_, Idle)
                | (Idle | Closed, Countdown)
                | (Countdown, Open | Closed | Paused)
                | (Open, Closed | Paused)
                | (Paused, Countdown | Open)
        ) || before.phase == after.phase;

        if legal {
            Ok(())
        } else {
            violation(self.name(), format!("{} -> {}", before.phase, after.phase))
        }
    }
}

/// Ids stay dense and the table only grows, and only while idle.
pub struct RegistryAppendOnly;

impl Invariant for RegistryAppendOnly {
    fn name(&self) -> &'static str {
        "registry_append_only"
    }

    fn check(&self, before: &RoundSnapshot, after: &RoundSnapshot) -> InvariantResult {
        if after.outcomes.len() != after.participant_count
            || after.names.len() != after.participant_count
        {
            return violation(
                self.name(),
                format!(
                    "{} participants but {} outcomes and {} names",
                    after.participant_count,
                    after.outcomes.len(),
                    after.names.len()
                ),
            );
        }
        if after.participant_count < before.participant_count {
            return violation(
                self.name(),
                format!("shrank from {} to {}", before.participant_count, after.participant_count),
            );
        }
        if after.participant_count > before.participant_count
            && !(before.phase == Phase::Idle && after.phase == Phase::Idle)
        {
            return violation(
                self.name(),
                format!("registered during {} -> {}", before.phase, after.phase),
            );
        }
        Ok(())
    }
}

/// A recorded outcome is never overwritten within a round.
///
/// The only way a non-zero outcome changes is a full clear (start or
/// reset).
pub struct AnswerFinality;

impl Invariant for AnswerFinality {
    fn name(&self) -> &'static str {
        "answer_finality"
    }

    fn check(&self, before: &RoundSnapshot, after: &RoundSnapshot) -> InvariantResult {
        if after.is_cleared() {
            return Ok(());
        }
        for (id, (&old, &new)) in before.outcomes.iter().zip(&after.outcomes).enumerate() {
            if old != 0 && old != new {
                return violation(self.name(), format!("participant {id}: {old} became {new}"));
            }
        }
        Ok(())
    }
}

/// No outcomes are visible while idle.
pub struct IdleHasNoOutcomes;

impl Invariant for IdleHasNoOutcomes {
    fn name(&self) -> &'static str {
        "idle_has_no_outcomes"
    }

    fn check(&self, _before: &RoundSnapshot, after: &RoundSnapshot) -> InvariantResult {
        if after.phase == Phase::Idle && !after.is_cleared() {
            return violation(self.name(), format!("outcomes {:?}", after.outcomes));
        }
        Ok(())
    }
}
