//! Configuration from CLI arguments and environment.
//!
//! The three bridge-defining values (`TOPIC_PREFIX`, `VELUX_IP`,
//! `VELUX_PASSWORD`) are required and checked before anything touches the
//! network; a missing one is fatal. Broker settings are collaborator
//! configuration and default sensibly.

use clap::Parser;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOPIC_PREFIX not set, not starting")]
    MissingTopicPrefix,

    #[error("VELUX_IP not set, not starting")]
    MissingGatewayHost,

    #[error("VELUX_PASSWORD not set, not starting")]
    MissingGatewayPassword,

    #[error("Invalid topic prefix '{0}': must be non-empty and free of MQTT wildcards")]
    InvalidTopicPrefix(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// MQTT bridge for VELUX KLF-200 window covering gateways.
#[derive(Parser, Debug, Clone)]
#[command(name = "mqtt-bridge-velux")]
#[command(about = "Mirrors KLF-200 products to MQTT topics and relays set commands back")]
#[command(version)]
pub struct Args {
    /// MQTT topic prefix for product state topics.
    #[arg(long, env = "TOPIC_PREFIX")]
    pub topic_prefix: Option<String>,

    /// Hostname or IP address of the KLF-200 gateway.
    #[arg(long, env = "VELUX_IP")]
    pub velux_ip: Option<String>,

    /// Password of the KLF-200 gateway (the one on its back plate).
    #[arg(long, env = "VELUX_PASSWORD", hide_env_values = true)]
    pub velux_password: Option<String>,

    /// MQTT broker hostname.
    #[arg(long, env = "MQTT_HOST", default_value = "localhost")]
    pub mqtt_host: String,

    /// MQTT broker port.
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    /// MQTT username (anonymous when unset).
    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT password.
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "mqtt-bridge-velux")]
    pub mqtt_client_id: String,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Hostname or IP, optionally with an explicit `:port`.
    pub host: String,
    pub password: String,
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

/// Validated bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Topic prefix, normalized to carry no trailing slash.
    pub topic_prefix: String,
    pub gateway: GatewayConfig,
    pub mqtt: MqttConfig,
}

impl Config {
    /// Validate parsed arguments into a usable configuration.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let topic_prefix = args.topic_prefix.ok_or(ConfigError::MissingTopicPrefix)?;
        let host = args.velux_ip.ok_or(ConfigError::MissingGatewayHost)?;
        let password = args
            .velux_password
            .ok_or(ConfigError::MissingGatewayPassword)?;

        let topic_prefix = topic_prefix.trim_end_matches('/').to_string();
        if topic_prefix.is_empty() || topic_prefix.contains(['+', '#', '\0']) {
            return Err(ConfigError::InvalidTopicPrefix(topic_prefix));
        }

        Ok(Self {
            topic_prefix,
            gateway: GatewayConfig { host, password },
            mqtt: MqttConfig {
                host: args.mqtt_host,
                port: args.mqtt_port,
                username: args.mqtt_username,
                password: args.mqtt_password,
                client_id: args.mqtt_client_id,
            },
        })
    }
}
