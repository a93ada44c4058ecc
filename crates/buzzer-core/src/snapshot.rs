//! Feed snapshots.
//!
//! Serialized with camelCase keys for the spectator and moderator pages.

use buzzer_proto::ParticipantId;
use serde::Serialize;

use crate::{clock::Millis, phase::Phase};

/// State pushed to the live-result feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Controller time when the snapshot was taken, ms since epoch
    pub epoch_now: Millis,
    /// Round time consumed before the last pause
    pub elapsed_at_pause: u64,
    /// Absolute instant of the next transition, if any
    pub next_milestone: Option<Millis>,
    /// Registered participants
    pub participant_count: usize,
    /// Outcomes indexed by participant id
    pub outcomes: Vec<i64>,
    /// Participant whose answer triggered this push
    pub last_answered: Option<ParticipantId>,
}

/// State pushed to the configuration feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Countdown length (t1)
    pub countdown_ms: u64,
    /// Answering window length (t2)
    pub open_ms: u64,
    /// Clock tolerance for device timestamps
    pub clock_tolerance_ms: u64,
    /// Names indexed by participant id
    pub names: Vec<Option<String>>,
}
