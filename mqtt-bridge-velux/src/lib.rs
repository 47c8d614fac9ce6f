//! MQTT bridge for VELUX KLF-200 window covering gateways.
//!
//! The bridge mirrors product state to MQTT topics and translates topic
//! writes into gateway commands:
//!
//! - [`config`] - Configuration from CLI arguments and environment
//! - [`topic`] - Topic construction, parsing, and name normalization
//! - [`directory`] - In-memory directory of enumerated products
//! - [`bus`] - MQTT client wrapper (connection state, subscriptions)
//! - [`bridge`] - The relay logic in both directions
//! - [`status`] - Retained bridge status on the admin topic

pub mod bridge;
pub mod bus;
pub mod config;
pub mod directory;
pub mod status;
pub mod topic;

// Re-export commonly used types at the crate root
pub use bridge::Bridge;
pub use config::{Args, Config, ConfigError};
pub use directory::ProductDirectory;
pub use topic::{TopicBuilder, normalize_name};

/// Initialize tracing for the bridge process.
///
/// `RUST_LOG` wins when set; otherwise the given level (default `info`)
/// applies to the whole process.
pub fn init_tracing(level: Option<&str>) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
