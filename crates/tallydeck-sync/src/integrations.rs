//! Device integration registry
//!
//! A device integration links a device to one metric from a user's
//! connected provider (e.g. a subscriber count) together with how it is
//! shown on the display. The registry tracks the last fetched value and
//! when each integration is next due for a refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A metric shown on one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIntegration {
    pub id: u64,
    /// The device displaying this metric
    pub device_uuid: Uuid,
    /// Metric kind (e.g. "subscribers", "followers")
    pub metric_type: String,
    /// Display label
    pub label: String,
    /// Hex display color
    pub color: String,
    /// Seconds between refreshes
    pub refresh_interval_secs: u64,
    /// Inactive integrations are skipped by the sweep
    pub is_active: bool,
    /// Last fetched value
    pub last_value: Option<String>,
    /// When the value was last fetched
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl DeviceIntegration {
    /// Whether this integration is due for a refresh
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_synced_at {
            None => true,
            Some(synced) => now - synced >= Duration::seconds(self.refresh_interval_secs as i64),
        }
    }
}

/// In-memory registry of device integrations
#[derive(Clone, Default)]
pub struct IntegrationStore {
    inner: Arc<RwLock<Table>>,
}

#[derive(Default)]
struct Table {
    items: HashMap<u64, DeviceIntegration>,
    next_id: u64,
}

impl IntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a metric to a device
    pub async fn link(
        &self,
        device_uuid: Uuid,
        metric_type: String,
        label: String,
        color: String,
        refresh_interval_secs: u64,
    ) -> DeviceIntegration {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        let integration = DeviceIntegration {
            id: table.next_id,
            device_uuid,
            metric_type,
            label,
            color,
            refresh_interval_secs,
            is_active: true,
            last_value: None,
            last_synced_at: None,
        };
        table.items.insert(integration.id, integration.clone());
        integration
    }

    /// Remove an integration
    pub async fn unlink(&self, id: u64) -> bool {
        let mut table = self.inner.write().await;
        table.items.remove(&id).is_some()
    }

    /// Fetch a single integration
    pub async fn get(&self, id: u64) -> Option<DeviceIntegration> {
        let table = self.inner.read().await;
        table.items.get(&id).cloned()
    }

    /// Integrations linked to one device
    pub async fn list_for_device(&self, device_uuid: &Uuid) -> Vec<DeviceIntegration> {
        let table = self.inner.read().await;
        table
            .items
            .values()
            .filter(|i| i.device_uuid == *device_uuid)
            .cloned()
            .collect()
    }

    /// Active integrations that are due for a refresh
    pub async fn pending_sync(&self) -> Vec<DeviceIntegration> {
        let now = Utc::now();
        let table = self.inner.read().await;
        table
            .items
            .values()
            .filter(|i| i.is_active && i.is_due(now))
            .cloned()
            .collect()
    }

    /// Record a freshly fetched value
    pub async fn record_value(&self, id: u64, value: String) {
        let mut table = self.inner.write().await;
        if let Some(integration) = table.items.get_mut(&id) {
            integration.last_value = Some(value);
            integration.last_synced_at = Some(Utc::now());
        }
    }

    /// Deactivate an integration without removing it
    pub async fn deactivate(&self, id: u64) {
        let mut table = self.inner.write().await;
        if let Some(integration) = table.items.get_mut(&id) {
            integration.is_active = false;
        }
    }
}
