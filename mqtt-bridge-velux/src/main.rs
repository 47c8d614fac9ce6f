//! MQTT bridge for VELUX KLF-200 window covering gateways.
//!
//! Mirrors every product's target position to `<prefix>/<name>` (retained)
//! and relays writes on `<prefix>/+/set` back to the gateway.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use mqtt_bridge_velux::bridge::Bridge;
use mqtt_bridge_velux::config::{Args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    mqtt_bridge_velux::init_tracing(args.log_level.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {e}"))?;

    // Fail-fast: a missing required value ends the process before any
    // network connection is attempted.
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::abort();
        }
    };

    info!(
        "{} {} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let bridge = Bridge::start(&config)
        .await
        .context("Failed to start bridge")?;

    bridge.run().await.context("Bridge failed")?;

    Ok(())
}
