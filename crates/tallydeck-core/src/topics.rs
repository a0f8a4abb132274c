//! MQTT topic addressing and payload types
//!
//! Topic names are part of the wire contract with device firmware:
//! every topic is `devices/{uuid}/{suffix}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five per-device topics handed out after verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTopics {
    /// Metric value updates pushed to the display
    pub integration: String,
    /// Display configuration changes
    pub config: String,
    /// Server-issued commands (reboot, identify)
    pub command: String,
    /// Device status announcements
    pub status: String,
    /// Periodic liveness heartbeats
    pub heartbeat: String,
}

impl DeviceTopics {
    /// Derive the topic set for a device UUID
    pub fn for_device(uuid: &Uuid) -> Self {
        Self {
            integration: format!("devices/{}/integration", uuid),
            config: format!("devices/{}/config", uuid),
            command: format!("devices/{}/command", uuid),
            status: format!("devices/{}/status", uuid),
            heartbeat: format!("devices/{}/heartbeat", uuid),
        }
    }
}

/// Payload published to the integration topic when a metric changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationUpdate {
    /// Metric kind (e.g. "subscribers", "followers")
    #[serde(rename = "type")]
    pub metric_type: String,
    /// The new value, preformatted as a string
    pub value: String,
    /// Display label shown next to the value
    pub label: String,
    /// Hex display color
    pub color: String,
    /// When the value was fetched
    pub timestamp: DateTime<Utc>,
}
