//! Device record store
//!
//! Exposes only the operations the auth and pairing flows need: lookup by
//! UUID, the verification upsert, owner assignment, and the heartbeat
//! updates. There is deliberately no generic update-by-filter surface;
//! every mutation is keyed by device UUID.

use crate::device::{Device, DeviceMetadata, DeviceStatus};
use crate::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredDevices {
    /// Devices indexed by UUID
    devices: HashMap<Uuid, Device>,
    /// Monotonic id counter
    next_id: u64,
}

/// Device store with file persistence
pub struct DeviceStore {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory cache of devices
    data: Arc<RwLock<StoredDevices>>,
}

impl DeviceStore {
    /// Create a device store at the given path, loading existing data if present
    pub async fn with_path(path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => {
                    info!("Loaded device store from {:?}", path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse device store, starting fresh: {}", e);
                    StoredDevices::default()
                }
            }
        } else {
            debug!("No existing device store, creating new");
            StoredDevices::default()
        };

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Save current state to disk
    async fn save(&self) -> StoreResult<()> {
        let data = self.data.read().await;
        let json = serde_json::to_string_pretty(&*data)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved device store to {:?}", self.path);
        Ok(())
    }

    /// Look up a device by UUID
    pub async fn find_by_uuid(&self, uuid: &Uuid) -> Option<Device> {
        let data = self.data.read().await;
        data.devices.get(uuid).cloned()
    }

    /// Create or refresh a device record after successful verification
    ///
    /// Creates the record in the pairing state if absent; otherwise merges
    /// the supplied metadata fields and forces the status back to pairing.
    /// Ownership is left untouched either way.
    pub async fn upsert_for_auth(
        &self,
        uuid: Uuid,
        metadata: DeviceMetadata,
    ) -> StoreResult<Device> {
        let device = {
            let mut data = self.data.write().await;
            match data.devices.get_mut(&uuid) {
                Some(device) => {
                    device.apply_verification(metadata);
                    device.clone()
                }
                None => {
                    data.next_id += 1;
                    let device = Device::new(data.next_id, uuid, metadata);
                    data.devices.insert(uuid, device.clone());
                    device
                }
            }
        };
        self.save().await?;
        debug!("Upserted device {} (status={})", uuid, device.status);
        Ok(device)
    }

    /// Hand the device to a user and bring it online
    ///
    /// Called when a pairing code is redeemed.
    pub async fn assign_owner(&self, uuid: &Uuid, user_id: u64) -> StoreResult<Device> {
        let device = {
            let mut data = self.data.write().await;
            let device = data
                .devices
                .get_mut(uuid)
                .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;
            device.user_id = Some(user_id);
            device.status = DeviceStatus::Online;
            device.clone()
        };
        self.save().await?;
        info!("Device {} paired with user {}", uuid, user_id);
        Ok(device)
    }

    /// Record a heartbeat: mark the device online and touch last_seen_at
    pub async fn mark_online(&self, uuid: &Uuid) -> StoreResult<()> {
        {
            let mut data = self.data.write().await;
            let device = data
                .devices
                .get_mut(uuid)
                .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;
            device.status = DeviceStatus::Online;
            device.touch();
        }
        self.save().await
    }

    /// Mark a device offline
    pub async fn mark_offline(&self, uuid: &Uuid) -> StoreResult<()> {
        {
            let mut data = self.data.write().await;
            let device = data
                .devices
                .get_mut(uuid)
                .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;
            device.status = DeviceStatus::Offline;
        }
        self.save().await
    }

    /// List devices owned by a user
    pub async fn list_for_user(&self, user_id: u64) -> Vec<Device> {
        let data = self.data.read().await;
        data.devices
            .values()
            .filter(|d| d.user_id == Some(user_id))
            .cloned()
            .collect()
    }

    /// List all devices
    pub async fn list(&self) -> Vec<Device> {
        let data = self.data.read().await;
        data.devices.values().cloned().collect()
    }
}
