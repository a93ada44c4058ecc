//! Shared runtime state.
//!
//! One controller per process, behind a single tokio mutex together with
//! its armed timers. Device connections, control requests and timer tasks
//! all go through [`SharedState::lock`], so every controller transition is
//! serialized and the timer set always matches the schedule that armed it.

use std::sync::Arc;

use buzzer_core::{
    ControlCommand, Controller, ControllerConfig, ControllerError, ControllerEvent, Environment,
};
use buzzer_proto::DeviceFrames;
use bytes::BytesMut;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    error::ServerError,
    executor::execute_actions,
    hub::{BroadcastHub, Feed, FeedMessage, Subscription},
    timers::TimerSet,
};

/// Controller plus the timer tasks it has armed.
#[derive(Debug)]
pub struct ControllerState<E: Environment> {
    pub(crate) controller: Controller<E>,
    pub(crate) timers: TimerSet,
}

impl<E: Environment> ControllerState<E> {
    /// The controller (read-only).
    pub fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    /// Number of armed timers that have not fired.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }
}

/// State shared by every connection and timer task.
#[derive(Debug)]
pub struct SharedState<E: Environment> {
    env: E,
    core: Mutex<ControllerState<E>>,
    hub: BroadcastHub,
}

impl<E: Environment> SharedState<E> {
    /// Create the shared state; the controller epoch is `env.now()`.
    pub fn new(env: E, config: ControllerConfig) -> Arc<Self> {
        let controller = Controller::new(env.clone(), config);
        Arc::new(Self {
            env,
            core: Mutex::new(ControllerState { controller, timers: TimerSet::new() }),
            hub: BroadcastHub::new(),
        })
    }

    /// Environment used for timestamps and timer sleeps.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Feed subscribers.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Lock the controller.
    pub async fn lock(&self) -> MutexGuard<'_, ControllerState<E>> {
        self.core.lock().await
    }

    /// Apply a moderator command and run the resulting actions.
    pub async fn apply(self: &Arc<Self>, command: ControlCommand) -> Result<(), ControllerError> {
        let mut state = self.lock().await;
        let actions = state.controller.process_event(ControllerEvent::Control(command))?;
        execute_actions(self, &mut state, actions);
        Ok(())
    }

    /// Process one chunk read from a device connection.
    ///
    /// Every request in the chunk is handled in order under one lock and
    /// stamped with the same receipt instant. Malformed input ends the walk
    /// over the chunk and gets no reply. Returns the encoded replies.
    pub async fn handle_device_chunk(
        self: &Arc<Self>,
        peer: &str,
        chunk: &[u8],
        received_at: E::Instant,
    ) -> BytesMut {
        let mut out = BytesMut::new();
        let mut state = self.lock().await;

        for frame in DeviceFrames::new(chunk) {
            let request = match frame {
                Ok(request) => request,
                Err(error) => {
                    tracing::debug!(peer, %error, "Dropping malformed device input");
                    continue;
                },
            };

            tracing::trace!(peer, ?request, "Device request");
            match state.controller.process_event(ControllerEvent::Device { request, received_at }) {
                Ok(actions) => {
                    for reply in execute_actions(self, &mut state, actions) {
                        reply.encode(&mut out);
                    }
                },
                Err(error) => tracing::warn!(peer, %error, "Device request failed"),
            }
        }

        out
    }

    /// Subscribe to a feed, returning the current snapshot to send first.
    ///
    /// Taken under the controller lock so that nothing published after the
    /// snapshot is missed and nothing older is queued behind it.
    pub async fn subscribe(&self, feed: Feed) -> Result<(FeedMessage, Subscription), ServerError> {
        let state = self.lock().await;
        let initial = match feed {
            Feed::Live => serde_json::to_string(&state.controller.live_snapshot(None))?,
            Feed::Config => serde_json::to_string(&state.controller.config_snapshot())?,
        };
        let subscription = self.hub.pool(feed).subscribe();
        Ok((FeedMessage::from(initial), subscription))
    }

    /// Participant names indexed by id.
    pub async fn names(&self) -> Vec<Option<String>> {
        self.lock().await.controller.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemEnv;

    #[tokio::test]
    async fn subscribers_get_snapshot_then_pushes() {
        let state = SharedState::new(SystemEnv::new(), ControllerConfig::default());

        let (live_initial, mut live) = state.subscribe(Feed::Live).await.unwrap();
        let (config_initial, mut config) = state.subscribe(Feed::Config).await.unwrap();

        let live_initial: serde_json::Value = serde_json::from_str(&live_initial).unwrap();
        assert_eq!(live_initial["phase"], "idle");
        assert_eq!(live_initial["participantCount"], 0);
        assert_eq!(live_initial["nextMilestone"], serde_json::Value::Null);

        let config_initial: serde_json::Value = serde_json::from_str(&config_initial).unwrap();
        assert_eq!(config_initial["phase"], "idle");
        assert_eq!(config_initial["countdownMs"], 3_000);
        assert_eq!(config_initial["openMs"], 10_000);
        assert_eq!(config_initial["clockToleranceMs"], 30);

        // Nothing is queued behind the initial snapshot.
        assert!(live.receiver.try_recv().is_err());
        assert!(config.receiver.try_recv().is_err());

        state.apply(ControlCommand::Start).await.unwrap();

        let pushed: serde_json::Value =
            serde_json::from_str(&live.receiver.try_recv().unwrap()).unwrap();
        assert_eq!(pushed["phase"], "countdown");
        assert!(pushed["nextMilestone"].is_u64());

        let pushed: serde_json::Value =
            serde_json::from_str(&config.receiver.try_recv().unwrap()).unwrap();
        assert_eq!(pushed["phase"], "countdown");
        assert_eq!(pushed["countdownMs"], 3_000);
    }

    #[tokio::test]
    async fn closed_subscribers_stop_receiving() {
        let state = SharedState::new(SystemEnv::new(), ControllerConfig::default());

        let (_, mut kept) = state.subscribe(Feed::Live).await.unwrap();
        let (_, dropped) = state.subscribe(Feed::Live).await.unwrap();
        let (_, left) = state.subscribe(Feed::Live).await.unwrap();
        assert_eq!(state.hub().pool(Feed::Live).len(), 3);

        // A socket that closed unsubscribes itself; one whose task died
        // only drops its receiver and is pruned on the next publish.
        assert!(state.hub().pool(Feed::Live).unsubscribe(left.id));
        drop(dropped);

        state.apply(ControlCommand::Start).await.unwrap();

        assert_eq!(state.hub().pool(Feed::Live).len(), 1);
        assert!(kept.receiver.try_recv().is_ok());
        assert!(state.hub().pool(Feed::Config).is_empty());
    }
}
