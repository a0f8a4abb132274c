//! Device entity
//!
//! Represents a physical counter display unit. A record is created the
//! first time a device passes signature verification and is updated in
//! place on later verifications and heartbeats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a device
///
/// The auth core only ever writes `Pairing`; `Online` is set when a user
/// redeems the pairing code, `Offline` by the heartbeat path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Pairing,
    Online,
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceStatus::Pairing => "pairing",
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

/// A device record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Store-assigned numeric identifier
    pub id: u64,
    /// Hardware identity, matches the provisioned key record
    pub uuid: Uuid,
    /// Owning user, set when a pairing code is redeemed
    pub user_id: Option<u64>,
    /// User-assigned display name
    pub name: Option<String>,
    /// Reported MAC address
    pub mac_address: Option<String>,
    /// Last reported IP address
    pub ip_address: Option<String>,
    /// Reported firmware version
    pub firmware_version: Option<String>,
    /// Lifecycle state
    pub status: DeviceStatus,
    /// Last heartbeat timestamp
    pub last_seen_at: Option<DateTime<Utc>>,
    /// When the record was first created
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Create a fresh record for a newly verified device
    pub fn new(id: u64, uuid: Uuid, metadata: DeviceMetadata) -> Self {
        Self {
            id,
            uuid,
            user_id: None,
            name: None,
            mac_address: metadata.mac_address,
            ip_address: metadata.ip_address,
            firmware_version: metadata.firmware_version,
            status: DeviceStatus::Pairing,
            last_seen_at: None,
            created_at: Utc::now(),
        }
    }

    /// Merge freshly reported metadata, leaving unset fields unchanged,
    /// and force the device back into the pairing state.
    pub fn apply_verification(&mut self, metadata: DeviceMetadata) {
        if metadata.mac_address.is_some() {
            self.mac_address = metadata.mac_address;
        }
        if metadata.ip_address.is_some() {
            self.ip_address = metadata.ip_address;
        }
        if metadata.firmware_version.is_some() {
            self.firmware_version = metadata.firmware_version;
        }
        // Re-verification resets status but preserves ownership.
        self.status = DeviceStatus::Pairing;
    }

    /// Whether a user owns this device
    pub fn is_paired(&self) -> bool {
        self.user_id.is_some()
    }

    /// Update the last seen timestamp
    pub fn touch(&mut self) {
        self.last_seen_at = Some(Utc::now());
    }
}

/// Network/firmware metadata reported by a device at verification time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub firmware_version: Option<String>,
}

/// Summary of a device for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: u64,
    pub uuid: Uuid,
    pub name: Option<String>,
    pub mac_address: Option<String>,
    pub firmware_version: Option<String>,
    pub status: DeviceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            uuid: device.uuid,
            name: device.name.clone(),
            mac_address: device.mac_address.clone(),
            firmware_version: device.firmware_version.clone(),
            status: device.status,
            last_seen_at: device.last_seen_at,
            created_at: device.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(mac: Option<&str>, ip: Option<&str>, fw: Option<&str>) -> DeviceMetadata {
        DeviceMetadata {
            mac_address: mac.map(String::from),
            ip_address: ip.map(String::from),
            firmware_version: fw.map(String::from),
        }
    }

    #[test]
    fn test_new_device_starts_pairing() {
        let device = Device::new(1, Uuid::new_v4(), metadata(Some("AA:BB:CC:DD:EE:FF"), None, None));
        assert_eq!(device.status, DeviceStatus::Pairing);
        assert!(!device.is_paired());
        assert_eq!(device.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_apply_verification_merges_and_resets_status() {
        let mut device = Device::new(
            1,
            Uuid::new_v4(),
            metadata(Some("AA:BB:CC:DD:EE:FF"), Some("10.0.0.5"), Some("1.0.0")),
        );
        device.status = DeviceStatus::Online;
        device.user_id = Some(42);

        device.apply_verification(metadata(None, Some("10.0.0.9"), None));

        assert_eq!(device.status, DeviceStatus::Pairing);
        assert_eq!(device.user_id, Some(42));
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.9"));
        // Unset fields keep their old values
        assert_eq!(device.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(device.firmware_version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&DeviceStatus::Pairing).unwrap();
        assert_eq!(json, "\"pairing\"");
    }
}
