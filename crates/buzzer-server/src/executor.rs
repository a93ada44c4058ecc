//! Executes controller actions against the runtime.

use std::{sync::Arc, time::Duration};

use buzzer_core::{ControllerAction, ControllerEvent, Environment, ScheduledTimer};
use buzzer_proto::DeviceReply;

use crate::state::{ControllerState, SharedState};

/// Execute controller actions.
///
/// Timer and feed actions are carried out here; device replies are
/// returned in order for the caller to write to its own connection.
pub(crate) fn execute_actions<E: Environment>(
    shared: &Arc<SharedState<E>>,
    state: &mut ControllerState<E>,
    actions: Vec<ControllerAction>,
) -> Vec<DeviceReply> {
    let mut replies = Vec::new();

    for action in actions {
        match action {
            ControllerAction::Reply(reply) => replies.push(reply),

            ControllerAction::CancelTimers => {
                let cancelled = state.timers.cancel_all();
                if cancelled > 0 {
                    tracing::debug!(cancelled, "Cancelled pending phase timers");
                }
            },

            ControllerAction::ArmTimer(scheduled) => {
                let delay = scheduled.fire_at.saturating_sub(state.controller.now_ms());
                tracing::debug!(
                    timer = ?scheduled.timer,
                    fire_at = scheduled.fire_at,
                    delay_ms = delay,
                    "Arming phase timer"
                );
                let handle = tokio::spawn(fire_timer(
                    Arc::clone(shared),
                    scheduled,
                    Duration::from_millis(delay),
                ));
                state.timers.push(handle);
            },

            ControllerAction::PushLive(snapshot) => {
                let delivered = shared.hub().publish_live(&snapshot);
                tracing::trace!(delivered, phase = %snapshot.phase, "Pushed live snapshot");
            },

            ControllerAction::PushConfig(snapshot) => {
                let delivered = shared.hub().publish_config(&snapshot);
                tracing::trace!(delivered, phase = %snapshot.phase, "Pushed config snapshot");
            },
        }
    }

    replies
}

/// Sleep until a phase timer is due, then deliver it to the controller.
async fn fire_timer<E: Environment>(
    shared: Arc<SharedState<E>>,
    scheduled: ScheduledTimer,
    delay: Duration,
) {
    shared.env().sleep(delay).await;

    let mut state = shared.lock().await;
    let event = ControllerEvent::TimerFired { timer: scheduled.timer, token: scheduled.token };
    match state.controller.process_event(event) {
        Ok(actions) => {
            let replies = execute_actions(&shared, &mut state, actions);
            debug_assert!(replies.is_empty(), "timers never produce device replies");
        },
        Err(error) => tracing::warn!(%error, "Phase timer failed"),
    }
}
