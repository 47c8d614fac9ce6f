//! MQTT bus client.
//!
//! Thin wrapper around `rumqttc` owning the event-loop task: it tracks the
//! connection state machine, (re)subscribes to the command pattern on every
//! connack, and forwards incoming publishes to the bridge over a channel.
//! Reconnecting after a transport drop is the client's own behavior; the
//! bridge never drives it.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::MqttConfig;

/// MQTT keep-alive interval.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Pause between reconnect attempts after a transport error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Request/forward channel capacities.
const CHANNEL_CAPACITY: usize = 64;

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Connection state of the bus link.
///
/// Transitions: `Connecting -> Connected` on connack and
/// `Connected -> Disconnected` on transport drop, each logged once per
/// transition rather than on every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

/// Handle for publishing to the bus.
#[derive(Debug, Clone)]
pub struct BusClient {
    client: AsyncClient,
}

impl BusClient {
    /// Connect to the broker and start the event-loop task.
    ///
    /// Subscribes to `command_pattern` (QoS 1) every time the session comes
    /// up. When `last_will` is given, the broker publishes it retained if
    /// the bridge dies without saying goodbye.
    pub fn connect(
        config: &MqttConfig,
        command_pattern: String,
        last_will: Option<(String, String)>,
    ) -> (Self, mpsc::Receiver<BusMessage>) {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = &config.username {
            options.set_credentials(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            );
        }
        if let Some((topic, payload)) = last_will {
            options.set_last_will(LastWill::new(topic, payload, QoS::AtLeastOnce, true));
        }

        let (client, event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        info!(
            "Connecting to MQTT broker at {}:{}",
            config.host, config.port
        );
        tokio::spawn(run_event_loop(event_loop, client.clone(), command_pattern, tx));

        (Self { client }, rx)
    }

    /// Publish a retained message with at-least-once delivery.
    pub async fn publish_retained(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload.into())
            .await?;
        Ok(())
    }
}

/// Drive the rumqttc event loop forever.
async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    command_pattern: String,
    tx: mpsc::Sender<BusMessage>,
) {
    let mut state = ConnectionState::Connecting;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if state != ConnectionState::Connected {
                    info!("Connected to MQTT broker");
                    state = ConnectionState::Connected;
                }
                info!(pattern = %command_pattern, "mqtt subscribe");
                if let Err(e) = client.subscribe(&command_pattern, QoS::AtLeastOnce).await {
                    error!("Failed to subscribe to '{command_pattern}': {e}");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BusMessage {
                    topic: publish.topic.clone(),
                    payload: String::from_utf8_lossy(&publish.payload).into_owned(),
                };
                if tx.send(message).await.is_err() {
                    // Receiver gone: the bridge is shutting down.
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if state != ConnectionState::Disconnected {
                    error!("mqtt disconnected: {e}");
                    state = ConnectionState::Disconnected;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
