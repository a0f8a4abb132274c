//! The sync sweep
//!
//! Runs on a fixed interval. Third-party provider clients and the real
//! MQTT connection live behind the two traits here; the server wires in
//! its implementations at startup.

use crate::integrations::{DeviceIntegration, IntegrationStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tallydeck_core::{DeviceTopics, IntegrationUpdate};
use tracing::{debug, error, info};

/// Fetches the current value of a metric from its provider
#[async_trait]
pub trait MetricFetcher: Send + Sync {
    /// Returns `None` when the provider has no value (e.g. token expired);
    /// errors are per-item and never abort a sweep.
    async fn fetch(&self, integration: &DeviceIntegration) -> Result<Option<String>>;
}

/// Publishes integration updates toward devices
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, update: &IntegrationUpdate) -> Result<()>;
}

/// Fetcher that never has a value, for wiring without provider clients
pub struct NullFetcher;

#[async_trait]
impl MetricFetcher for NullFetcher {
    async fn fetch(&self, _integration: &DeviceIntegration) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Publisher that only logs, for wiring without a broker connection
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, topic: &str, update: &IntegrationUpdate) -> Result<()> {
        info!(
            "Publish to {}: {}={} ({})",
            topic, update.metric_type, update.value, update.label
        );
        Ok(())
    }
}

/// Periodic integration sync
pub struct SyncRunner {
    store: IntegrationStore,
    fetcher: Arc<dyn MetricFetcher>,
    publisher: Arc<dyn Publisher>,
    interval: Duration,
}

impl SyncRunner {
    pub fn new(
        store: IntegrationStore,
        fetcher: Arc<dyn MetricFetcher>,
        publisher: Arc<dyn Publisher>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            publisher,
            interval,
        }
    }

    /// Run sweeps forever
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// Sync every pending integration once, fail-soft per item
    pub async fn sweep(&self) {
        let pending = self.store.pending_sync().await;
        if pending.is_empty() {
            return;
        }
        info!("Syncing {} device integrations", pending.len());

        for integration in pending {
            match self.sync_one(&integration).await {
                Ok(true) => {
                    debug!(
                        "Metric updated for integration {} on device {}",
                        integration.id, integration.device_uuid
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        "Failed to sync integration {} on device {}: {}",
                        integration.id, integration.device_uuid, e
                    );
                }
            }
        }
    }

    /// Fetch one metric; publish only when the value changed
    async fn sync_one(&self, integration: &DeviceIntegration) -> Result<bool> {
        let Some(value) = self.fetcher.fetch(integration).await? else {
            return Ok(false);
        };

        let changed = integration.last_value.as_deref() != Some(value.as_str());
        self.store.record_value(integration.id, value.clone()).await;

        if changed {
            let topic = DeviceTopics::for_device(&integration.device_uuid).integration;
            let update = IntegrationUpdate {
                metric_type: integration.metric_type.clone(),
                value,
                label: integration.label.clone(),
                color: integration.color.clone(),
                timestamp: Utc::now(),
            };
            self.publisher.publish(&topic, &update).await?;
        }

        Ok(changed)
    }
}
