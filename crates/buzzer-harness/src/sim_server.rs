//! Simulation server for testing with turmoil.
//!
//! `SimServer` runs the production device handler
//! ([`serve_device`](buzzer_server::serve_device)) over turmoil TCP. The
//! controller sits on [`TurmoilEnv`], so phase timers sleep on turmoil's
//! virtual clock and whole rounds complete in simulated time.

use std::{io, sync::Arc, time::Duration};

use buzzer_core::{ControlCommand, ControllerConfig};
use buzzer_server::{SharedState, serve_device};
use turmoil::net::TcpListener;

use crate::TurmoilEnv;

/// Device listener inside a turmoil host.
pub struct SimServer {
    shared: Arc<SharedState<TurmoilEnv>>,
    listener: TcpListener,
}

impl SimServer {
    /// Create the controller and bind the device listener.
    pub async fn bind(address: &str, config: ControllerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let shared = SharedState::new(TurmoilEnv, config);
        Ok(Self { shared, listener })
    }

    /// Shared controller state.
    pub fn shared(&self) -> Arc<SharedState<TurmoilEnv>> {
        Arc::clone(&self.shared)
    }

    /// Apply a moderator command after `delay` of simulated time.
    pub fn schedule_command(&self, delay: Duration, command: ControlCommand) {
        let shared = self.shared();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let name = command.name();
            if let Err(error) = shared.apply(command).await {
                tracing::warn!(command = name, %error, "Scheduled command rejected");
            }
        });
    }

    /// Accept one device and serve it on its own task.
    pub async fn accept_device(&self) -> io::Result<()> {
        let (stream, peer) = self.listener.accept().await?;
        let shared = self.shared();
        tokio::spawn(async move {
            if let Err(e) = serve_device(shared, stream, peer.to_string()).await {
                tracing::debug!(%peer, error = %e, "Simulated device connection error");
            }
        });
        Ok(())
    }

    /// Accept devices until the listener fails.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            self.accept_device().await?;
        }
    }
}
