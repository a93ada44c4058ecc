//! Stepped simulation of one controller.
//!
//! `SimDriver` owns a [`Controller`] on a [`SimEnv`] clock and plays the
//! role of the runtime: it keeps the armed timers, fires them in deadline
//! order as the clock moves, and records everything the controller emits.
//! There is no I/O and no concurrency, so every run is reproducible.

use std::time::Duration;

use buzzer_core::{
    ConfigSnapshot, ControlCommand, Controller, ControllerAction, ControllerConfig,
    ControllerError, ControllerEvent, LiveSnapshot, Millis, Phase, ScheduledTimer,
};
use buzzer_proto::{AnswerCode, DeviceFrames, DeviceReply, DeviceRequest, ParticipantId};

use crate::{
    SimEnv,
    invariants::{InvariantRegistry, RoundSnapshot, Violation},
};

/// Stepped controller simulation.
pub struct SimDriver {
    env: SimEnv,
    controller: Controller<SimEnv>,
    /// Armed timers, sorted by deadline
    timers: Vec<ScheduledTimer>,
    live: Vec<LiveSnapshot>,
    config: Vec<ConfigSnapshot>,
    invariants: InvariantRegistry,
    violations: Vec<Violation>,
}

impl SimDriver {
    /// Create a driver with the standard invariants, clock at zero.
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_invariants(config, InvariantRegistry::standard())
    }

    /// Create a driver checking a custom set of invariants.
    pub fn with_invariants(config: ControllerConfig, invariants: InvariantRegistry) -> Self {
        let env = SimEnv::new();
        let controller = Controller::new(env.clone(), config);
        Self {
            env,
            controller,
            timers: Vec::new(),
            live: Vec::new(),
            config: Vec::new(),
            invariants,
            violations: Vec::new(),
        }
    }

    /// Controller time in ms since epoch.
    pub fn now_ms(&self) -> Millis {
        self.controller.now_ms()
    }

    /// The simulated controller.
    pub fn controller(&self) -> &Controller<SimEnv> {
        &self.controller
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    /// Timers armed and not yet fired, in deadline order.
    pub fn pending_timers(&self) -> &[ScheduledTimer] {
        &self.timers
    }

    /// Every live-feed push so far.
    pub fn live_pushes(&self) -> &[LiveSnapshot] {
        &self.live
    }

    /// Every config-feed push so far.
    pub fn config_pushes(&self) -> &[ConfigSnapshot] {
        &self.config
    }

    /// Invariant violations observed so far.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Feed one event through the controller, checking invariants.
    fn step(
        &mut self,
        event: ControllerEvent<Duration>,
    ) -> Result<Vec<DeviceReply>, ControllerError> {
        let before = RoundSnapshot::from_controller(&self.controller);
        let actions = self.controller.process_event(event)?;
        let replies = self.execute(actions);
        let after = RoundSnapshot::from_controller(&self.controller);

        for violation in self.invariants.collect_violations(&before, &after) {
            tracing::error!(%violation, "Invariant violated");
            self.violations.push(violation);
        }
        Ok(replies)
    }

    fn execute(&mut self, actions: Vec<ControllerAction>) -> Vec<DeviceReply> {
        let mut replies = Vec::new();
        for action in actions {
            match action {
                ControllerAction::Reply(reply) => replies.push(reply),
                ControllerAction::CancelTimers => self.timers.clear(),
                ControllerAction::ArmTimer(timer) => {
                    let at = self.timers.partition_point(|t| t.fire_at <= timer.fire_at);
                    self.timers.insert(at, timer);
                },
                ControllerAction::PushLive(snapshot) => self.live.push(snapshot),
                ControllerAction::PushConfig(snapshot) => self.config.push(snapshot),
            }
        }
        replies
    }

    /// Send one decoded request from a device.
    pub fn send(&mut self, request: DeviceRequest) -> Option<DeviceReply> {
        let received_at = Duration::from_millis(self.env.now_ms());
        let event = ControllerEvent::Device { request, received_at };
        // Device requests never fail; refusals are expressed as replies.
        self.step(event).ok().and_then(|replies| replies.into_iter().next())
    }

    /// Send raw bytes as one chunk read from a device socket.
    ///
    /// Returns the encoded replies, exactly as the runtime would write
    /// them back.
    pub fn device_bytes(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for request in DeviceFrames::new(chunk).map_while(Result::ok) {
            if let Some(reply) = self.send(request) {
                reply.encode(&mut out);
            }
        }
        out
    }

    /// Register a device. `None` if registration is closed or full.
    pub fn register(&mut self) -> Option<ParticipantId> {
        match self.send(DeviceRequest::Register)? {
            DeviceReply::Registered { id } => Some(id),
            _ => None,
        }
    }

    /// Ask for controller time, as a device synchronizing its clock would.
    pub fn query_clock(&mut self) -> Option<u32> {
        match self.send(DeviceRequest::ClockQuery)? {
            DeviceReply::Clock { elapsed_ms } => Some(elapsed_ms),
            _ => None,
        }
    }

    /// Submit an answer stamped with the device's elapsed time.
    pub fn answer(&mut self, id: ParticipantId, device_elapsed_ms: u32) -> Option<AnswerCode> {
        match self.send(DeviceRequest::Answer { id, device_elapsed_ms })? {
            DeviceReply::Answer(code) => Some(code),
            _ => None,
        }
    }

    /// Submit an answer from a device whose clock is exactly in sync.
    pub fn answer_now(&mut self, id: ParticipantId) -> Option<AnswerCode> {
        let now = u32::try_from(self.now_ms()).unwrap_or(u32::MAX);
        self.answer(id, now)
    }

    /// Apply a moderator command.
    pub fn command(&mut self, command: ControlCommand) -> Result<(), ControllerError> {
        self.step(ControllerEvent::Control(command)).map(|_| ())
    }

    /// Advance the clock by `ms`, firing due timers in deadline order.
    ///
    /// Returns the phase after each timer that changed it.
    pub fn advance(&mut self, ms: u64) -> Vec<Phase> {
        let target = self.now_ms().saturating_add(ms);
        let mut transitions = Vec::new();

        while let Some(timer) = self.timers.first().copied() {
            if timer.fire_at > target {
                break;
            }
            self.timers.remove(0);
            self.env.advance(timer.fire_at.saturating_sub(self.now_ms()));

            let before = self.phase();
            let event = ControllerEvent::TimerFired { timer: timer.timer, token: timer.token };
            if self.step(event).is_ok() && self.phase() != before {
                transitions.push(self.phase());
            }
        }

        self.env.advance(target.saturating_sub(self.now_ms()));
        transitions
    }
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDriver")
            .field("now_ms", &self.now_ms())
            .field("controller", &self.controller)
            .field("pending_timers", &self.timers.len())
            .field("violations", &self.violations.len())
            .finish()
    }
}
