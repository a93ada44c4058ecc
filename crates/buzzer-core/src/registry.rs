//! Participant registry.
//!
//! Append-only table of buzzer participants. Ids are dense indices handed out
//! in registration order, so the table is a plain `Vec` indexed by id.
//! Entries are never removed; a participant keeps its id for the whole life
//! of the process.
//!
//! Registration gating by phase is the controller's job. The registry only
//! enforces that new ids fit the 4-byte wire field.

use buzzer_proto::ParticipantId;

use crate::error::ControllerError;

/// Outcome value meaning "has not answered this round".
///
/// An answer landing exactly on the first millisecond of the open phase is
/// also recorded as 0 and is therefore indistinguishable from no answer.
pub const UNANSWERED: i64 = 0;

/// Largest number of participants the wire format can address.
pub const MAX_PARTICIPANTS: u64 = u32::MAX as u64 + 1;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Dense id, equal to the participant's index
    pub id: ParticipantId,
    /// Display name set by the moderator
    pub name: Option<String>,
    /// 0 = unanswered, < 0 = foul (ms early), > 0 = ms after open
    pub outcome: i64,
}

impl Participant {
    /// Whether an answer has been recorded this round.
    pub fn has_answered(&self) -> bool {
        self.outcome != UNANSWERED
    }

    /// Whether the recorded answer was a foul.
    pub fn is_foul(&self) -> bool {
        self.outcome < 0
    }
}

/// Registry of participants.
#[derive(Debug, Clone)]
pub struct Registry {
    participants: Vec<Participant>,
    limit: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry accepting up to [`MAX_PARTICIPANTS`].
    pub fn new() -> Self {
        Self::with_limit(MAX_PARTICIPANTS)
    }

    /// Create an empty registry with a smaller participant limit.
    pub fn with_limit(limit: u64) -> Self {
        Self { participants: Vec::new(), limit: limit.min(MAX_PARTICIPANTS) }
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nobody has registered yet.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Append a participant and return its id.
    ///
    /// Returns `None` once the limit is reached.
    pub fn register(&mut self) -> Option<ParticipantId> {
        if self.participants.len() as u64 >= self.limit {
            return None;
        }

        let id = ParticipantId::try_from(self.participants.len()).ok()?;
        self.participants.push(Participant { id, name: None, outcome: UNANSWERED });
        Some(id)
    }

    /// Participant by id. `None` if not registered.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id as usize)
    }

    /// Overwrite a participant's name. Allowed in every phase.
    pub fn set_name(&mut self, id: ParticipantId, name: String) -> Result<(), ControllerError> {
        let participant = self
            .participants
            .get_mut(id as usize)
            .ok_or(ControllerError::UnknownParticipant(id))?;
        participant.name = Some(name);
        Ok(())
    }

    /// Names indexed by id.
    pub fn names(&self) -> Vec<Option<String>> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    /// Outcomes indexed by id.
    pub fn outcomes(&self) -> Vec<i64> {
        self.participants.iter().map(|p| p.outcome).collect()
    }

    /// Store an outcome. Returns `false` for unknown ids.
    pub(crate) fn record_outcome(&mut self, id: ParticipantId, outcome: i64) -> bool {
        match self.participants.get_mut(id as usize) {
            Some(participant) => {
                participant.outcome = outcome;
                true
            },
            None => false,
        }
    }

    /// Clear every outcome back to [`UNANSWERED`].
    pub fn reset_outcomes(&mut self) {
        for participant in &mut self.participants {
            participant.outcome = UNANSWERED;
        }
    }

    /// Iterate over all participants in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.participants.iter()
    }
}
