//! Error types for the competition controller.
//!
//! Only moderator commands produce errors. Device admissions that fail
//! (registration after start, late or duplicate answers) are normal protocol
//! outcomes and are answered with reject codes instead.

use buzzer_proto::ParticipantId;
use thiserror::Error;

use crate::phase::Phase;

/// Errors returned for rejected control commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Command not allowed in the current phase
    #[error("invalid state transition: cannot {operation} from {phase}")]
    InvalidTransition {
        /// Phase when the command arrived
        phase: Phase,
        /// Command that was attempted
        operation: &'static str,
    },

    /// Timing parameter outside its valid range
    #[error("invalid {name}: {value} (must be a positive integer)")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: u64,
    },

    /// No participant with this id has registered
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
}

impl ControllerError {
    /// Returns true if the same command may succeed later without changes.
    ///
    /// Phase-gated commands become valid once the round moves on; bad
    /// parameters and unknown ids never fix themselves.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ControllerError::InvalidTransition { phase: Phase::Countdown, operation: "start" };
        assert_eq!(err.to_string(), "invalid state transition: cannot start from countdown");

        let err = ControllerError::InvalidParameter { name: "countdown_ms", value: 0 };
        assert_eq!(err.to_string(), "invalid countdown_ms: 0 (must be a positive integer)");

        assert_eq!(ControllerError::UnknownParticipant(9).to_string(), "unknown participant: 9");
    }

    #[test]
    fn only_phase_errors_are_transient() {
        assert!(
            ControllerError::InvalidTransition { phase: Phase::Open, operation: "reset" }
                .is_transient()
        );
        assert!(!ControllerError::InvalidParameter { name: "open_ms", value: 0 }.is_transient());
        assert!(!ControllerError::UnknownParticipant(0).is_transient());
    }
}
