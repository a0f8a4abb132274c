//! Device key registry
//!
//! Holds each device's manufacturing-time identity: UUID and ECDSA P-256
//! public key in PEM form, plus the one-time activation timestamp. Records
//! are provisioned out-of-band (factory tooling, `tallydeck-keygen`) and
//! are never deleted here.

use crate::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A pre-provisioned device identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Hardware identity, fixed at manufacturing
    pub device_uuid: Uuid,
    /// ECDSA P-256 public key, PEM encoded
    pub public_key: String,
    /// Set once, on first successful verification
    pub activated_at: Option<DateTime<Utc>>,
}

impl DeviceKey {
    /// Create an unactivated key record
    pub fn new(device_uuid: Uuid, public_key: String) -> Self {
        Self {
            device_uuid,
            public_key,
            activated_at: None,
        }
    }

    /// Whether the device has completed its first verification
    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }
}

/// Stored data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredKeys {
    /// Keys indexed by device UUID
    keys: HashMap<Uuid, DeviceKey>,
}

/// Key registry with file persistence
pub struct DeviceKeyStore {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory cache of keys
    data: Arc<RwLock<StoredKeys>>,
}

impl DeviceKeyStore {
    /// Create a key store at the given path, loading existing data if present
    pub async fn with_path(path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => {
                    info!("Loaded device key registry from {:?}", path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse device key registry, starting fresh: {}", e);
                    StoredKeys::default()
                }
            }
        } else {
            debug!("No existing device key registry, creating new");
            StoredKeys::default()
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
        debug!("Saved device key registry to {:?}", self.path);
        Ok(())
    }

    /// Look up a key by device UUID
    pub async fn find(&self, uuid: &Uuid) -> Option<DeviceKey> {
        let data = self.data.read().await;
        data.keys.get(uuid).cloned()
    }

    /// Provision a new key record
    ///
    /// Overwrites any existing record for the UUID; provisioning tooling is
    /// the only caller.
    pub async fn insert(&self, key: DeviceKey) -> StoreResult<()> {
        let uuid = key.device_uuid;
        {
            let mut data = self.data.write().await;
            data.keys.insert(uuid, key);
        }
        self.save().await?;
        info!("Provisioned device key {}", uuid);
        Ok(())
    }

    /// Record first activation for a device key
    ///
    /// Idempotent: once `activated_at` is set it is never overwritten.
    pub async fn mark_activated(&self, uuid: &Uuid) -> StoreResult<()> {
        let newly_activated = {
            let mut data = self.data.write().await;
            let key = data
                .keys
                .get_mut(uuid)
                .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;
            if key.activated_at.is_none() {
                key.activated_at = Some(Utc::now());
                true
            } else {
                false
            }
        };
        if newly_activated {
            self.save().await?;
            info!("Activated device key {}", uuid);
        }
        Ok(())
    }

    /// Number of provisioned keys
    pub async fn count(&self) -> usize {
        let data = self.data.read().await;
        data.keys.len()
    }
}
