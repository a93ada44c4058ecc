//! Observable controller state for invariant checks.

use buzzer_core::{Controller, Environment, Phase};

/// What an outside observer can see of the controller after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Registered participant count
    pub participant_count: usize,
    /// Outcomes indexed by id
    pub outcomes: Vec<i64>,
    /// Names indexed by id
    pub names: Vec<Option<String>>,
}

impl RoundSnapshot {
    /// Capture the controller's observable state.
    pub fn from_controller<E: Environment>(controller: &Controller<E>) -> Self {
        Self {
            phase: controller.phase(),
            participant_count: controller.registry().len(),
            outcomes: controller.registry().outcomes(),
            names: controller.names(),
        }
    }

    /// Whether every outcome is unanswered.
    pub fn is_cleared(&self) -> bool {
        self.outcomes.iter().all(|&o| o == 0)
    }
}
