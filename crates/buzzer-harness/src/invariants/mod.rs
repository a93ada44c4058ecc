//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold across every step the
//! controller takes, whatever mix of device requests, moderator commands
//! and timer firings produced it. Each check compares the observable state
//! before and after one step.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let before = RoundSnapshot::from_controller(&controller);
//! // ... one event ...
//! let after = RoundSnapshot::from_controller(&controller);
//! assert!(registry.collect_violations(&before, &after).is_empty());
//! ```

mod checks;
mod snapshot;

pub use checks::{AnswerFinality, IdleHasNoOutcomes, LegalPhaseTransition, RegistryAppendOnly};
pub use snapshot::RoundSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of one controller step.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the step from `before` to `after`.
    fn check(&self, before: &RoundSnapshot, after: &RoundSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every built-in invariant.
    ///
    /// Includes:
    /// - [`LegalPhaseTransition`]: only the documented phase edges occur
    /// - [`RegistryAppendOnly`]: ids stay dense and only grow while idle
    /// - [`AnswerFinality`]: a recorded outcome changes only by a full clear
    /// - [`IdleHasNoOutcomes`]: idle rounds carry no outcomes
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(LegalPhaseTransition);
        registry.add(RegistryAppendOnly);
        registry.add(AnswerFinality);
        registry.add(IdleHasNoOutcomes);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant and collect all violations.
    pub fn collect_violations(
        &self,
        before: &RoundSnapshot,
        after: &RoundSnapshot,
    ) -> Vec<Violation> {
        self.invariants.iter().filter_map(|i| i.check(before, after).err()).collect()
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no invariants are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
