//! Competition controller.
//!
//! Ties together the clock, participant registry, phase machine and arbiter
//! behind one event entry point. The controller is Sans-IO: it consumes
//! [`ControllerEvent`]s and returns [`ControllerAction`]s for the runtime
//! (production server or simulation harness) to execute. Wrapping it in a
//! single lock gives the one serialization point every device connection,
//! moderator command and timer callback goes through.

use buzzer_proto::{DeviceReply, DeviceRequest, ParticipantId};

use crate::{
    arbiter::{Answer, Arbiter, DEFAULT_CLOCK_TOLERANCE_MS, Verdict},
    clock::{ClockSync, Millis},
    env::Environment,
    error::ControllerError,
    phase::{
        DEFAULT_COUNTDOWN_MS, DEFAULT_OPEN_MS, Phase, PhaseMachine, PhaseTimer, ScheduledTimer,
        TimerToken,
    },
    registry::Registry,
    snapshot::{ConfigSnapshot, LiveSnapshot},
};

/// Controller configuration (round tunables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Countdown length in ms (t1)
    pub countdown_ms: u64,
    /// Answering window length in ms (t2)
    pub open_ms: u64,
    /// Maximum device/controller clock disagreement in ms
    pub clock_tolerance_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            open_ms: DEFAULT_OPEN_MS,
            clock_tolerance_ms: DEFAULT_CLOCK_TOLERANCE_MS,
        }
    }
}

/// Moderator commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Begin a round
    Start,
    /// Abort everything and return to idle
    Reset,
    /// Suspend the running round
    Pause,
    /// Continue a paused round
    Resume,
    /// Change the countdown length
    SetCountdownMs(u64),
    /// Change the answering window length
    SetOpenMs(u64),
    /// Change the device clock tolerance
    SetClockToleranceMs(u64),
    /// Name a participant
    SetName {
        /// Participant to rename
        id: ParticipantId,
        /// New display name
        name: String,
    },
}

impl ControlCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Reset => "reset",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::SetCountdownMs(_) => "set_countdown_ms",
            Self::SetOpenMs(_) => "set_open_ms",
            Self::SetClockToleranceMs(_) => "set_clock_tolerance_ms",
            Self::SetName { .. } => "set_name",
        }
    }
}

/// Events the controller processes.
#[derive(Debug, Clone)]
pub enum ControllerEvent<I> {
    /// A device request was decoded
    Device {
        /// The request
        request: DeviceRequest,
        /// When its bytes arrived, before waiting for the controller
        received_at: I,
    },

    /// A moderator command
    Control(ControlCommand),

    /// A phase timer fired
    TimerFired {
        /// Which timer
        timer: PhaseTimer,
        /// Token it was armed with
        token: TimerToken,
    },
}

/// Actions the controller produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// Write this reply to the requesting device
    Reply(DeviceReply),

    /// Cancel every pending phase timer
    CancelTimers,

    /// Arm a phase timer
    ArmTimer(ScheduledTimer),

    /// Push to the live-result feed
    PushLive(LiveSnapshot),

    /// Push to the configuration feed
    PushConfig(ConfigSnapshot),
}

/// Action-based competition controller.
pub struct Controller<E>
where
    E: Environment,
{
    /// Environment (time)
    env: E,
    /// Epoch captured at construction
    clock: ClockSync<E::Instant>,
    /// Participants and outcomes
    registry: Registry,
    /// Phase and round timing
    phase: PhaseMachine,
    /// Answer validation
    arbiter: Arbiter,
}

impl<E> Controller<E>
where
    E: Environment,
{
    /// Create a controller; the epoch is `env.now()`.
    pub fn new(env: E, config: ControllerConfig) -> Self {
        Self::with_registry(env, config, Registry::new())
    }

    /// Create a controller around a pre-built registry.
    pub fn with_registry(env: E, config: ControllerConfig, registry: Registry) -> Self {
        let clock = ClockSync::new(env.now());
        Self {
            env,
            clock,
            registry,
            phase: PhaseMachine::new(config.countdown_ms, config.open_ms),
            arbiter: Arbiter::new(config.clock_tolerance_ms),
        }
    }

    /// Process an event and return actions to execute.
    ///
    /// This is the main entry point for the controller. Errors are only
    /// returned for rejected control commands; state is unchanged when one
    /// is returned.
    pub fn process_event(
        &mut self,
        event: ControllerEvent<E::Instant>,
    ) -> Result<Vec<ControllerAction>, ControllerError> {
        match event {
            ControllerEvent::Device { request, received_at } => {
                Ok(self.handle_device_request(request, received_at))
            },
            ControllerEvent::Control(command) => self.handle_control(command),
            ControllerEvent::TimerFired { timer, token } => Ok(self.handle_timer(timer, token)),
        }
    }

    /// Handle one decoded device request.
    fn handle_device_request(
        &mut self,
        request: DeviceRequest,
        received_at: E::Instant,
    ) -> Vec<ControllerAction> {
        match request {
            DeviceRequest::ClockQuery => {
                let elapsed_ms = self.clock.query_epoch(received_at);
                vec![ControllerAction::Reply(DeviceReply::Clock { elapsed_ms })]
            },
            DeviceRequest::Register => self.handle_register(),
            DeviceRequest::Answer { id, device_elapsed_ms } => {
                let answer = Answer {
                    id,
                    device_elapsed_ms: u64::from(device_elapsed_ms),
                    server_elapsed_ms: self.clock.elapsed_ms(received_at),
                };
                self.handle_answer(answer)
            },
        }
    }

    fn handle_register(&mut self) -> Vec<ControllerAction> {
        let phase = self.phase.phase();
        if !phase.accepts_registration() {
            tracing::debug!(%phase, "Registration refused outside idle");
            return Vec::new();
        }

        let Some(id) = self.registry.register() else {
            tracing::warn!(count = self.registry.len(), "Registration refused, registry full");
            return Vec::new();
        };

        tracing::info!(id, "Participant registered");

        vec![
            ControllerAction::Reply(DeviceReply::Registered { id }),
            ControllerAction::PushLive(self.live_snapshot(None)),
            ControllerAction::PushConfig(self.config_snapshot()),
        ]
    }

    fn handle_answer(&mut self, answer: Answer) -> Vec<ControllerAction> {
        let verdict = self.arbiter.submit(&self.phase, &mut self.registry, answer);
        let mut actions = vec![ControllerAction::Reply(DeviceReply::Answer(verdict.code()))];

        match verdict {
            Verdict::Accepted { .. } => {
                actions.push(ControllerAction::PushLive(self.live_snapshot(Some(answer.id))));
            },
            Verdict::Rejected(reason) => {
                tracing::debug!(id = answer.id, ?reason, "Answer rejected");
            },
        }

        actions
    }

    /// Handle a moderator command.
    fn handle_control(
        &mut self,
        command: ControlCommand,
    ) -> Result<Vec<ControllerAction>, ControllerError> {
        let now = self.now_ms();
        let operation = command.name();

        let result = match command {
            ControlCommand::Start => self.phase.start(now).map(|timers| {
                self.registry.reset_outcomes();
                self.lifecycle_actions(timers)
            }),
            ControlCommand::Reset => {
                self.phase.reset();
                self.registry.reset_outcomes();
                Ok(self.lifecycle_actions(Vec::new()))
            },
            ControlCommand::Pause => {
                self.phase.pause(now).map(|()| self.lifecycle_actions(Vec::new()))
            },
            ControlCommand::Resume => {
                self.phase.resume(now).map(|timers| self.lifecycle_actions(timers))
            },
            ControlCommand::SetCountdownMs(value) => {
                self.phase.set_countdown_ms(value).map(|()| self.config_actions())
            },
            ControlCommand::SetOpenMs(value) => {
                self.phase.set_open_ms(value).map(|()| self.config_actions())
            },
            ControlCommand::SetClockToleranceMs(value) => {
                self.phase.check_parameter("clock_tolerance_ms", value).map(|()| {
                    self.arbiter.set_tolerance_ms(value);
                    self.config_actions()
                })
            },
            ControlCommand::SetName { id, name } => {
                self.registry.set_name(id, name).map(|()| self.config_actions())
            },
        };

        match &result {
            Ok(_) => {
                tracing::info!(operation, phase = %self.phase.phase(), "Control command applied");
            },
            Err(e) => {
                tracing::warn!(operation, error = %e, "Control command rejected");
            },
        }

        result
    }

    /// Actions after a phase-changing command: drop old timers, arm new
    /// ones, refresh both feeds.
    fn lifecycle_actions(&self, timers: Vec<ScheduledTimer>) -> Vec<ControllerAction> {
        let mut actions = Vec::with_capacity(timers.len() + 3);
        actions.push(ControllerAction::CancelTimers);
        actions.extend(timers.into_iter().map(ControllerAction::ArmTimer));
        actions.push(ControllerAction::PushLive(self.live_snapshot(None)));
        actions.push(ControllerAction::PushConfig(self.config_snapshot()));
        actions
    }

    fn config_actions(&self) -> Vec<ControllerAction> {
        vec![ControllerAction::PushConfig(self.config_snapshot())]
    }

    /// Handle a fired phase timer.
    fn handle_timer(&mut self, timer: PhaseTimer, token: TimerToken) -> Vec<ControllerAction> {
        match self.phase.on_timer(timer, token) {
            Some(phase) => {
                tracing::info!(?timer, %phase, "Phase timer fired");
                vec![ControllerAction::PushLive(self.live_snapshot(None))]
            },
            None => {
                tracing::debug!(
                    ?timer,
                    generation = token.generation(),
                    "Stale phase timer ignored"
                );
                Vec::new()
            },
        }
    }

    /// Controller time, ms since epoch.
    pub fn now_ms(&self) -> Millis {
        self.clock.elapsed_ms(self.env.now())
    }

    /// Snapshot for the live-result feed.
    pub fn live_snapshot(&self, last_answered: Option<ParticipantId>) -> LiveSnapshot {
        let now = self.now_ms();
        LiveSnapshot {
            phase: self.phase.phase(),
            epoch_now: now,
            elapsed_at_pause: self.phase.elapsed_at_pause(),
            next_milestone: self.phase.next_milestone(now),
            participant_count: self.registry.len(),
            outcomes: self.registry.outcomes(),
            last_answered,
        }
    }

    /// Snapshot for the configuration feed.
    pub fn config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            phase: self.phase.phase(),
            countdown_ms: self.phase.countdown_ms(),
            open_ms: self.phase.open_ms(),
            clock_tolerance_ms: self.arbiter.tolerance_ms(),
            names: self.registry.names(),
        }
    }

    /// Participant names indexed by id.
    pub fn names(&self) -> Vec<Option<String>> {
        self.registry.names()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    /// Phase machine (read-only).
    pub fn phase_machine(&self) -> &PhaseMachine {
        &self.phase
    }

    /// Participant registry (read-only).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl<E> std::fmt::Debug for Controller<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("phase", &self.phase.phase())
            .field("participants", &self.registry.len())
            .field("tolerance_ms", &self.arbiter.tolerance_ms())
            .finish_non_exhaustive()
    }
}
