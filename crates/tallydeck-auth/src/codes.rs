//! Pairing code registry
//!
//! Bidirectional mapping between a human-enterable 6-digit code and a
//! device UUID, valid for 10 minutes. Among live codes a value maps to at
//! most one device, and a device holds at most one live code. Both
//! directions live under a single lock, so issuing (invalidate old, pick
//! an unused code, record both directions) is atomic with respect to
//! concurrent issuance.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Pairing code validity in minutes
pub const CODE_TTL_MINUTES: i64 = 10;

/// Number of digits in a pairing code
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone)]
struct CodeEntry {
    device_uuid: Uuid,
    expires_at: DateTime<Utc>,
}

impl CodeEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Default)]
struct CodeTable {
    by_code: HashMap<String, CodeEntry>,
    by_device: HashMap<Uuid, String>,
}

impl CodeTable {
    fn prune(&mut self) {
        let dead: Vec<String> = self
            .by_code
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(code, _)| code.clone())
            .collect();
        for code in dead {
            if let Some(entry) = self.by_code.remove(&code) {
                self.by_device.remove(&entry.device_uuid);
            }
        }
    }

    fn drop_code(&mut self, code: &str, device_uuid: &Uuid) {
        self.by_code.remove(code);
        self.by_device.remove(device_uuid);
    }
}

/// In-memory TTL registry of live pairing codes
#[derive(Clone, Default)]
pub struct PairingCodes {
    table: Arc<RwLock<CodeTable>>,
}

impl PairingCodes {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh code for a device, invalidating its prior code
    ///
    /// Loops over uniformly random zero-padded codes until one is not
    /// currently live. The whole operation runs under the write lock, so
    /// two concurrent issuances can never claim the same code.
    pub async fn issue(&self, device_uuid: Uuid) -> String {
        let mut table = self.table.write().await;
        table.prune();

        if let Some(old) = table.by_device.remove(&device_uuid) {
            table.by_code.remove(&old);
        }

        let code = loop {
            let candidate = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
            if !table.by_code.contains_key(&candidate) {
                break candidate;
            }
        };

        table.by_code.insert(
            code.clone(),
            CodeEntry {
                device_uuid,
                expires_at: Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
            },
        );
        table.by_device.insert(device_uuid, code.clone());

        debug!("Issued pairing code for device {}", device_uuid);
        code
    }

    /// Look up the device a code belongs to
    pub async fn resolve(&self, code: &str) -> Option<Uuid> {
        let table = self.table.read().await;
        table
            .by_code
            .get(code)
            .filter(|e| !e.is_expired())
            .map(|e| e.device_uuid)
    }

    /// Look up the live code for a device
    pub async fn code_for(&self, device_uuid: &Uuid) -> Option<String> {
        let table = self.table.read().await;
        let code = table.by_device.get(device_uuid)?;
        table
            .by_code
            .get(code)
            .filter(|e| !e.is_expired())
            .map(|_| code.clone())
    }

    /// Resolve a code and consume it in one step
    ///
    /// Used by redemption so that two concurrent redeems of the same code
    /// cannot both succeed. An expired entry is dropped on the way out.
    pub async fn take(&self, code: &str) -> Option<Uuid> {
        let mut table = self.table.write().await;
        let entry = table.by_code.get(code)?;
        let device_uuid = entry.device_uuid;
        let live = !entry.is_expired();
        table.drop_code(code, &device_uuid);
        live.then_some(device_uuid)
    }

    /// Remove a code/device pair
    pub async fn invalidate(&self, code: &str, device_uuid: &Uuid) {
        let mut table = self.table.write().await;
        table.drop_code(code, device_uuid);
    }

    /// Number of entries in the code table, expired included
    #[cfg(test)]
    pub async fn entry_count(&self) -> usize {
        let table = self.table.read().await;
        table.by_code.len()
    }

    /// Shift a live code's expiry into the past by `minutes`
    #[cfg(test)]
    pub async fn age(&self, code: &str, minutes: i64) {
        let mut table = self.table.write().await;
        if let Some(entry) = table.by_code.get_mut(code) {
            entry.expires_at -= Duration::minutes(minutes);
        }
    }
}
