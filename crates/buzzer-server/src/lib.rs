//! Buzzer production server.
//!
//! Production runtime around [`buzzer_core`]'s Sans-IO [`Controller`]: tokio
//! TCP for buzzer devices, axum for the moderator control surface and the
//! spectator WebSocket feeds, and the system clock for phase timers.
//!
//! # Architecture
//!
//! The controller and its armed timers live in one [`SharedState`] behind a
//! single mutex. Every input (a device chunk, a `/ctr` request, a timer
//! wake-up) locks it, feeds one event to the controller and executes the
//! returned actions before releasing it.
//!
//! # Components
//!
//! - [`Server`]: binds both listeners and runs them
//! - [`SharedState`]: controller, timers and feed hub
//! - [`BroadcastHub`]: live and config feed subscribers
//! - [`serve_device`]: one device connection
//! - [`create_router`]: control surface and feeds
//! - [`SystemEnv`]: production environment (real time)
//!
//! [`Controller`]: buzzer_core::Controller

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod control;
mod device;
mod error;
mod executor;
mod hub;
mod state;
mod system_env;
mod timers;

use std::{future::IntoFuture, net::SocketAddr, sync::Arc};

use buzzer_core::ControllerConfig;
pub use control::{ControlQuery, ControlRequest, create_router};
pub use device::serve_device;
pub use error::ServerError;
pub use hub::{BroadcastHub, Feed, FeedMessage, SubscriberId, SubscriberPool, Subscription};
pub use state::{ControllerState, SharedState};
pub use system_env::SystemEnv;
pub use timers::TimerSet;
use tokio::net::TcpListener;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address for buzzer device connections (e.g., "0.0.0.0:8091")
    pub device_bind: String,
    /// Address for the control surface and feeds (e.g., "0.0.0.0:8090")
    pub control_bind: String,
    /// Round timing and clock tolerance
    pub controller: ControllerConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            device_bind: "0.0.0.0:8091".to_string(),
            control_bind: "0.0.0.0:8090".to_string(),
            controller: ControllerConfig::default(),
        }
    }
}

impl ServerRuntimeConfig {
    /// Check the configuration before binding anything.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.controller.countdown_ms == 0 {
            return Err(ServerError::Config("countdown must be at least 1 ms".to_string()));
        }
        if self.controller.open_ms == 0 {
            return Err(ServerError::Config("answer window must be at least 1 ms".to_string()));
        }
        if self.controller.clock_tolerance_ms == 0 {
            return Err(ServerError::Config("clock tolerance must be at least 1 ms".to_string()));
        }
        Ok(())
    }
}

/// Production buzzer server.
pub struct Server {
    shared: Arc<SharedState<SystemEnv>>,
    device_listener: TcpListener,
    control_listener: TcpListener,
}

impl Server {
    /// Create the controller and bind both listeners.
    ///
    /// The controller epoch is taken here.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let device_listener = TcpListener::bind(&config.device_bind).await.map_err(|e| {
            ServerError::Transport(format!("failed to bind {}: {e}", config.device_bind))
        })?;
        let control_listener = TcpListener::bind(&config.control_bind).await.map_err(|e| {
            ServerError::Transport(format!("failed to bind {}: {e}", config.control_bind))
        })?;

        let shared = SharedState::new(SystemEnv::new(), config.controller);
        Ok(Self { shared, device_listener, control_listener })
    }

    /// Address the device listener is bound to.
    pub fn device_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.device_listener.local_addr()?)
    }

    /// Address the control surface is bound to.
    pub fn control_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.control_listener.local_addr()?)
    }

    /// Shared controller state.
    pub fn shared(&self) -> Arc<SharedState<SystemEnv>> {
        Arc::clone(&self.shared)
    }

    /// Run the server, accepting devices and serving the control surface.
    ///
    /// This method runs until the control server fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            device = %self.device_addr()?,
            control = %self.control_addr()?,
            "Server starting"
        );

        let app = create_router(Arc::clone(&self.shared));
        tokio::select! {
            result = axum::serve(self.control_listener, app).into_future() => {
                result.map_err(ServerError::from)
            },
            () = accept_devices(self.device_listener, self.shared) => Ok(()),
        }
    }
}

/// Accept device connections forever, one task per connection.
async fn accept_devices(listener: TcpListener, shared: Arc<SharedState<SystemEnv>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                }
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = serve_device(shared, stream, peer.to_string()).await {
                        tracing::debug!(%peer, error = %e, "Device connection error");
                    }
                });
            },
            Err(e) => {
                tracing::error!(error = %e, "Accept error");
            },
        }
    }
}
