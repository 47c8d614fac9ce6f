//! Relay logic between the gateway and the bus.
//!
//! Three event sources drive the bridge once it is up: gateway state
//! notifications, incoming bus commands, and the keep-alive timer. Each
//! runs in its own task; a failure while handling one event is logged and
//! never crosses into another handler.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use klf200::messages::{IncomingMessage, StateChange};
use klf200::{Connection, Position};

use crate::bus::{BusClient, BusError, BusMessage};
use crate::config::Config;
use crate::directory::ProductDirectory;
use crate::status::BridgeStatus;
use crate::topic::{self, TopicBuilder};

/// Interval of the product re-enumeration keep-alive.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] klf200::Error),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Resolve a gateway state change into a publishable `(topic, payload)`.
///
/// The node id maps to a product name, the name back to the product via
/// the normalized-name index. A node id the directory does not know yields
/// `None`: no name, no publish. An unknown target position publishes `"0"`.
pub fn state_publication(
    directory: &ProductDirectory,
    topics: &TopicBuilder,
    change: &StateChange,
) -> Option<(String, String)> {
    let named = directory.find_by_node_id(change.node_id)?;
    let product = directory.find_by_name(&named.name)?;
    let percent = change.target_position.percent().unwrap_or(0);
    Some((topics.state_topic(&product.name), percent.to_string()))
}

/// State publications for every product of a fresh enumeration.
pub fn initial_publications(
    directory: &ProductDirectory,
    topics: &TopicBuilder,
) -> Vec<(String, String)> {
    directory
        .products()
        .iter()
        .map(|product| {
            let percent = product.target_position.percent().unwrap_or(0);
            (topics.state_topic(&product.name), percent.to_string())
        })
        .collect()
}

/// Resolve an incoming bus message into a gateway command.
///
/// Only topics ending in `/set` qualify; the second-to-last segment is the
/// product name with underscores standing in for spaces. Unknown products
/// and unparsable payloads are logged and dropped, never surfaced to the
/// bus.
pub fn resolve_command(
    directory: &ProductDirectory,
    topic: &str,
    payload: &str,
) -> Option<(u8, Position)> {
    let segment = topic::command_name(topic)?;
    let name = topic::decode_command_name(segment);

    let Some(product) = directory.find_by_name(&name) else {
        info!("Found no product: {name}");
        return None;
    };

    let Ok(percent) = payload.trim().parse::<u8>() else {
        warn!("Ignoring command for '{}': bad position '{payload}'", product.name);
        return None;
    };
    if percent > 100 {
        warn!("Ignoring command for '{}': position {percent} out of range", product.name);
        return None;
    }

    info!("Setting {} to {percent}", product.name);
    Some((product.node_id, Position::from_percent(percent)))
}

/// The bridge: one gateway session, one bus client, one product directory.
pub struct Bridge {
    gateway: Arc<Connection>,
    bus: BusClient,
    commands: mpsc::Receiver<BusMessage>,
    directory: Arc<RwLock<ProductDirectory>>,
    topics: TopicBuilder,
}

impl Bridge {
    /// Connect both sides and perform the startup sequence: login,
    /// enumerate, republish every product's state, announce the bridge.
    ///
    /// A login failure is not recovered here; it propagates and ends the
    /// process (restart-oriented service).
    pub async fn start(config: &Config) -> Result<Self, BridgeError> {
        let topics = TopicBuilder::new(config.topic_prefix.clone());

        // The bus client queues publishes until the broker accepts the
        // session, so it comes up first.
        let (bus, commands) = BusClient::connect(
            &config.mqtt,
            topics.command_pattern(),
            Some((topics.status_topic(), BridgeStatus::offline().to_json())),
        );

        info!("Logging in to: {}", config.gateway.host);
        let gateway = Arc::new(Connection::connect(&config.gateway.host).await?);
        gateway.login(&config.gateway.password).await?;
        info!("Logged in");

        info!("Reading products");
        let products = gateway.get_all_products().await?;
        info!("Found {} products", products.len());
        let directory = ProductDirectory::new(products);

        for (topic, payload) in initial_publications(&directory, &topics) {
            debug!(topic = %topic, payload = %payload, "Publishing initial state");
            bus.publish_retained(&topic, payload).await?;
        }

        bus.publish_retained(
            &topics.status_topic(),
            BridgeStatus::running(directory.len(), &config.gateway.host).to_json(),
        )
        .await?;

        Ok(Self {
            gateway,
            bus,
            commands,
            directory: Arc::new(RwLock::new(directory)),
            topics,
        })
    }

    /// Run the relays and the keep-alive until Ctrl+C.
    pub async fn run(self) -> Result<(), BridgeError> {
        let Self {
            gateway,
            bus,
            mut commands,
            directory,
            topics,
        } = self;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        // Gateway -> bus: relay state changes.
        {
            let mut notifications = gateway.notifications();
            let directory = directory.clone();
            let bus = bus.clone();
            let topics = topics.clone();
            tasks.push(tokio::spawn(async move {
                info!("Subscribing to updates");
                loop {
                    use tokio::sync::broadcast::error::RecvError;
                    match notifications.recv().await {
                        Ok(IncomingMessage::NodeStatePositionChanged(change)) => {
                            let publication = {
                                let directory = directory.read().await;
                                state_publication(&directory, &topics, &change)
                            };
                            if let Some((topic, payload)) = publication {
                                info!(
                                    "Node {}: {} = {}",
                                    change.node_id, topic, payload
                                );
                                // A failed publish only loses this update.
                                if let Err(e) = bus.publish_retained(&topic, payload).await {
                                    error!("Update error: {e}");
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Dropped {skipped} gateway notifications");
                        }
                        Err(RecvError::Closed) => {
                            warn!("Gateway notification stream closed");
                            break;
                        }
                    }
                }
            }));
        }

        // Bus -> gateway: relay set commands.
        {
            let directory = directory.clone();
            let gateway = gateway.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(message) = commands.recv().await {
                    info!("mqtt <{}:{}", message.topic, message.payload);
                    let command = {
                        let directory = directory.read().await;
                        resolve_command(&directory, &message.topic, &message.payload)
                    };
                    if let Some((node_id, position)) = command {
                        if let Err(e) = gateway.set_target_position(node_id, position).await {
                            error!("Failed to set position: {e}");
                        }
                    }
                }
            }));
        }

        // Keep-alive: re-enumerate and replace the directory wholesale.
        {
            let directory = directory.clone();
            let gateway = gateway.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(KEEP_ALIVE_INTERVAL);
                // The startup enumeration just happened; skip the immediate tick.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    info!("Kicking keep alive");
                    // One failed refresh must not stop the loop.
                    match gateway.get_all_products().await {
                        Ok(products) => {
                            debug!("Refreshed {} products", products.len());
                            *directory.write().await = ProductDirectory::new(products);
                        }
                        Err(e) => warn!("Product refresh failed: {e}"),
                    }
                }
            }));
        }

        info!("Bridge running. Press Ctrl+C to stop.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Received shutdown signal");

        for task in &tasks {
            task.abort();
        }

        if let Err(e) = bus
            .publish_retained(&topics.status_topic(), BridgeStatus::offline().to_json())
            .await
        {
            warn!("Failed to publish offline status: {e}");
        }
        // Give the bus event loop a moment to flush the goodbye.
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Bridge stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klf200::Product;

    fn directory() -> ProductDirectory {
        ProductDirectory::new(vec![
            Product {
                node_id: 1,
                name: "Living Room".to_string(),
                current_position: Position::from_percent(30),
                target_position: Position::from_percent(30),
            },
            Product {
                node_id: 2,
                name: "Office".to_string(),
                current_position: Position::from_percent(75),
                target_position: Position::from_percent(75),
            },
        ])
    }

    fn change(node_id: u8, target: Position) -> StateChange {
        StateChange {
            node_id,
            current_position: target,
            target_position: target,
        }
    }

    #[test]
    fn test_state_publication_known_node() {
        let topics = TopicBuilder::new("velux");
        let publication =
            state_publication(&directory(), &topics, &change(1, Position::from_percent(40)));
        assert_eq!(
            publication,
            Some(("velux/living_room".to_string(), "40".to_string()))
        );
    }

    #[test]
    fn test_state_publication_unknown_node_is_dropped() {
        let topics = TopicBuilder::new("velux");
        assert_eq!(
            state_publication(&directory(), &topics, &change(9, Position::from_percent(40))),
            None
        );
    }

    #[test]
    fn test_state_publication_unknown_target_publishes_zero() {
        let topics = TopicBuilder::new("velux");
        let publication = state_publication(&directory(), &topics, &change(2, Position::UNKNOWN));
        assert_eq!(
            publication,
            Some(("velux/office".to_string(), "0".to_string()))
        );
    }

    #[test]
    fn test_resolve_command_not_a_set_topic() {
        assert_eq!(
            resolve_command(&directory(), "velux/living_room", "10"),
            None
        );
    }

    #[test]
    fn test_resolve_command_bad_payload() {
        assert_eq!(
            resolve_command(&directory(), "velux/living_room/set", "wide open"),
            None
        );
        assert_eq!(
            resolve_command(&directory(), "velux/living_room/set", "250"),
            None
        );
    }
}
