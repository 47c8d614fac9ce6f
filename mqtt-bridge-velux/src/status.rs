//! Retained bridge status on the admin topic.

use serde::{Deserialize, Serialize};

/// Bridge status information, published retained to `<prefix>/@/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running" or "offline").
    pub status: String,
    /// Number of products known at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<usize>,
    /// Gateway address the bridge is talking to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl BridgeStatus {
    /// Create a "running" status.
    pub fn running(products: usize, gateway: impl Into<String>) -> Self {
        Self {
            bridge: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "running".to_string(),
            products: Some(products),
            gateway: Some(gateway.into()),
        }
    }

    /// Create an "offline" status (also used as the MQTT last will).
    pub fn offline() -> Self {
        Self {
            bridge: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "offline".to_string(),
            products: None,
            gateway: None,
        }
    }

    /// Serialize for publishing.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"offline"}"#.to_string())
    }
}
