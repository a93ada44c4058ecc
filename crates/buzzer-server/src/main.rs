//! Buzzer server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: devices on 8091, control surface and feeds on 8090
//! buzzer-server
//!
//! # Shorter rounds, looser device clocks
//! buzzer-server --countdown-ms 2000 --open-ms 5000 --clock-tolerance-ms 50
//! ```

use buzzer_core::{
    ControllerConfig, DEFAULT_CLOCK_TOLERANCE_MS, DEFAULT_COUNTDOWN_MS, DEFAULT_OPEN_MS,
};
use buzzer_server::{Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Buzzer competition server
#[derive(Parser, Debug)]
#[command(name = "buzzer-server")]
#[command(about = "Buzzer competition controller")]
#[command(version)]
struct Args {
    /// Address for buzzer device connections
    #[arg(long, default_value = "0.0.0.0:8091")]
    device_bind: String,

    /// Address for the control surface and spectator feeds
    #[arg(long, default_value = "0.0.0.0:8090")]
    control_bind: String,

    /// Countdown length before answers count
    #[arg(long, default_value_t = DEFAULT_COUNTDOWN_MS)]
    countdown_ms: u64,

    /// Answer window length
    #[arg(long, default_value_t = DEFAULT_OPEN_MS)]
    open_ms: u64,

    /// Maximum gap between device and server clocks before the device
    /// timestamp is ignored
    #[arg(long, default_value_t = DEFAULT_CLOCK_TOLERANCE_MS)]
    clock_tolerance_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ServerRuntimeConfig {
        device_bind: args.device_bind,
        control_bind: args.control_bind,
        controller: ControllerConfig {
            countdown_ms: args.countdown_ms,
            open_ms: args.open_ms,
            clock_tolerance_ms: args.clock_tolerance_ms,
        },
    };
    tracing::info!(
        countdown_ms = config.controller.countdown_ms,
        open_ms = config.controller.open_ms,
        clock_tolerance_ms = config.controller.clock_tolerance_ms,
        "Buzzer server starting"
    );

    let server = Server::bind(config).await?;

    tracing::info!(
        device = %server.device_addr()?,
        control = %server.control_addr()?,
        "Server listening"
    );

    server.run().await?;

    Ok(())
}
