//! Property-based tests for the controller.
//!
//! These drive the controller through its public event API with a
//! hand-advanced clock and check the admission and scoring rules that must
//! hold for every input: dense ids, closed registration after start, one
//! answer per participant per round, outcome sign by phase, and the clock
//! trust decision.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use buzzer_core::{
    ControlCommand, Controller, ControllerAction, ControllerConfig, ControllerEvent, Environment,
    Phase, ScheduledTimer,
};
use buzzer_proto::{AnswerCode, DeviceReply, DeviceRequest};
use proptest::prelude::*;

/// Clock advanced by hand.
#[derive(Clone, Default)]
struct ManualEnv {
    now_ms: Arc<AtomicU64>,
}

impl ManualEnv {
    fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Environment for ManualEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

struct Rig {
    env: ManualEnv,
    ctrl: Controller<ManualEnv>,
    timers: Vec<ScheduledTimer>,
}

impl Rig {
    fn new(config: ControllerConfig) -> Self {
        let env = ManualEnv::default();
        let ctrl = Controller::new(env.clone(), config);
        Self { env, ctrl, timers: Vec::new() }
    }

    fn device(&mut self, request: DeviceRequest) -> Vec<ControllerAction> {
        let received_at = self.env.now();
        self.ctrl
            .process_event(ControllerEvent::Device { request, received_at })
            .expect("device requests never error")
    }

    fn register(&mut self) -> Option<u32> {
        self.device(DeviceRequest::Register).into_iter().find_map(|a| match a {
            ControllerAction::Reply(DeviceReply::Registered { id }) => Some(id),
            _ => None,
        })
    }

    fn answer(&mut self, id: u32, device_elapsed_ms: u32) -> Option<AnswerCode> {
        self.device(DeviceRequest::Answer { id, device_elapsed_ms }).into_iter().find_map(|a| {
            match a {
                ControllerAction::Reply(DeviceReply::Answer(code)) => Some(code),
                _ => None,
            }
        })
    }

    fn start(&mut self) {
        let actions = self
            .ctrl
            .process_event(ControllerEvent::Control(ControlCommand::Start))
            .expect("start from idle");
        self.timers = actions
            .into_iter()
            .filter_map(|a| match a {
                ControllerAction::ArmTimer(t) => Some(t),
                _ => None,
            })
            .collect();
    }

    /// Advance the clock, firing due timers in order.
    fn advance(&mut self, ms: u64) {
        let target = self.ctrl.now_ms() + ms;
        self.timers.sort_by_key(|t| t.fire_at);
        while let Some(timer) = self.timers.first().copied() {
            if timer.fire_at > target {
                break;
            }
            self.timers.remove(0);
            self.env.advance(timer.fire_at.saturating_sub(self.ctrl.now_ms()));
            self.ctrl
                .process_event(ControllerEvent::TimerFired { timer: timer.timer, token: timer.token })
                .expect("timers never error");
        }
        self.env.advance(target.saturating_sub(self.ctrl.now_ms()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Ids handed out while idle are exactly 0..n
    #[test]
    fn prop_register_ids_dense(n in 1usize..64, start_at in 0u64..100_000) {
        let mut rig = Rig::new(ControllerConfig::default());
        rig.advance(start_at);

        let ids: Vec<u32> = (0..n).filter_map(|_| rig.register()).collect();
        let expected: Vec<u32> = (0..n as u32).collect();
        prop_assert_eq!(ids, expected);
    }

    /// Registration never succeeds once a round has started
    #[test]
    fn prop_register_closed_after_start(
        before in 0usize..8,
        offsets in prop::collection::vec(0u64..20_000, 1..10)
    ) {
        let mut rig = Rig::new(ControllerConfig::default());
        for _ in 0..before {
            rig.register();
        }
        rig.start();

        for offset in offsets {
            rig.advance(offset);
            prop_assert_ne!(rig.ctrl.phase(), Phase::Idle);
            prop_assert_eq!(rig.register(), None);
        }
        prop_assert_eq!(rig.ctrl.registry().len(), before);
    }

    /// Each participant gets at most one recorded answer per round
    #[test]
    fn prop_one_answer_per_participant(
        participants in 1u32..6,
        attempts in prop::collection::vec((0u32..8, 0u64..2_000), 1..40)
    ) {
        let mut rig = Rig::new(ControllerConfig::default());
        for _ in 0..participants {
            rig.register();
        }
        rig.start();

        let mut recorded = vec![0i64; participants as usize];
        for (id, step) in attempts {
            rig.advance(step);
            let before = rig.ctrl.registry().outcomes();
            let now = rig.ctrl.now_ms() as u32;
            let code = rig.answer(id, now);

            let known = (id as usize) < recorded.len();
            let first = known && recorded[id as usize] == 0;
            let open = rig.ctrl.phase().accepts_answers();

            if first && open {
                prop_assert_eq!(code, Some(AnswerCode::Accepted));
                recorded[id as usize] = rig.ctrl.registry().outcomes()[id as usize];
            } else {
                prop_assert_eq!(code, Some(AnswerCode::Rejected));
                prop_assert_eq!(rig.ctrl.registry().outcomes(), before);
            }
        }
    }

    /// Countdown answers are fouls, open answers are never negative
    #[test]
    fn prop_outcome_sign_follows_phase(
        countdown in 100u64..5_000,
        open in 100u64..5_000,
        wait in 0u64..10_000,
        skew in -40i64..40
    ) {
        let config = ControllerConfig { countdown_ms: countdown, open_ms: open, ..Default::default() };
        let mut rig = Rig::new(config);
        rig.register();
        rig.start();
        rig.advance(wait);

        let phase = rig.ctrl.phase();
        let device = (rig.ctrl.now_ms() as i64 + skew).max(0) as u32;
        let code = rig.answer(0, device);
        let outcome = rig.ctrl.registry().outcomes()[0];

        match phase {
            Phase::Countdown => {
                prop_assert!(code.is_some_and(AnswerCode::is_accepted));
                prop_assert!(outcome < 0);
            },
            Phase::Open => {
                prop_assert!(code.is_some_and(AnswerCode::is_accepted));
                prop_assert!(outcome >= 0);
            },
            _ => {
                prop_assert_eq!(code, Some(AnswerCode::Rejected));
                prop_assert_eq!(outcome, 0);
            },
        }
    }

    /// Device time is used within tolerance, receipt time beyond it
    #[test]
    fn prop_clock_trust_decision(
        into_open in 1u64..9_000,
        skew in -200i64..200
    ) {
        let mut rig = Rig::new(ControllerConfig::default());
        rig.register();
        rig.start();
        rig.advance(3_000 + into_open);

        let server = rig.ctrl.now_ms() as i64;
        let device = server + skew;
        let code = rig.answer(0, device as u32);
        let outcome = rig.ctrl.registry().outcomes()[0];
        let open_at = rig.ctrl.phase_machine().open_starts_at() as i64;

        if skew.unsigned_abs() <= 30 {
            prop_assert_eq!(code, Some(AnswerCode::Accepted));
            let raw = device - open_at;
            prop_assert_eq!(outcome, if raw < 0 { 1 } else { raw });
        } else {
            prop_assert_eq!(code, Some(AnswerCode::AcceptedClockAdjusted));
            prop_assert_eq!(outcome, server - open_at);
        }
    }
}

#[test]
fn reset_from_every_phase_returns_to_idle() {
    for steps in [0u64, 1_000, 4_000, 20_000] {
        let mut rig = Rig::new(ControllerConfig::default());
        rig.register();
        rig.start();
        rig.advance(steps);
        rig.answer(0, rig.ctrl.now_ms() as u32);

        rig.ctrl.process_event(ControllerEvent::Control(ControlCommand::Reset)).unwrap();

        assert_eq!(rig.ctrl.phase(), Phase::Idle);
        assert_eq!(rig.ctrl.registry().outcomes(), vec![0]);

        // Timers armed before the reset must not move the machine
        rig.advance(30_000);
        assert_eq!(rig.ctrl.phase(), Phase::Idle);
    }
}
