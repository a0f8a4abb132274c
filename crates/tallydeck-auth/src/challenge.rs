//! Single-use challenge store
//!
//! Maps device UUID to a live random challenge with an absolute 60-second
//! expiry. At most one challenge is live per device: issuing a new one
//! replaces the previous. Expiry is enforced here, not by callers.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Challenge validity in seconds
pub const CHALLENGE_TTL_SECONDS: i64 = 60;

/// Challenge wire length: 32 random bytes as lowercase hex
pub const CHALLENGE_LENGTH: usize = 64;

#[derive(Debug, Clone)]
struct StoredChallenge {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredChallenge {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// In-memory TTL store for live challenges
#[derive(Clone, Default)]
pub struct ChallengeStore {
    entries: Arc<RwLock<HashMap<Uuid, StoredChallenge>>>,
}

impl ChallengeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh challenge value: 32 random bytes, lowercase hex
    pub fn generate() -> String {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(bytes)
    }

    /// Store a challenge for a device, replacing any live one
    pub async fn put(&self, device_uuid: Uuid, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            device_uuid,
            StoredChallenge {
                value,
                expires_at: Utc::now() + ttl,
            },
        );
        // Drop whatever has expired while we hold the lock
        entries.retain(|_, c| !c.is_expired());
    }

    /// Fetch the live challenge for a device, if any
    pub async fn get(&self, device_uuid: &Uuid) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(device_uuid)
            .filter(|c| !c.is_expired())
            .map(|c| c.value.clone())
    }

    /// Consume the device's challenge only if it is live and equals `expected`
    ///
    /// Compare and remove happen under one lock, so two submissions of the
    /// same challenge can never both consume it.
    pub async fn take_if_eq(&self, device_uuid: &Uuid, expected: &str) -> bool {
        let mut entries = self.entries.write().await;
        let matches = entries
            .get(device_uuid)
            .is_some_and(|c| !c.is_expired() && c.value == expected);
        if matches {
            entries.remove(device_uuid);
        }
        matches
    }

    /// Shift a stored challenge's expiry into the past by `secs` seconds
    #[cfg(test)]
    pub async fn age(&self, device_uuid: &Uuid, secs: i64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(device_uuid) {
            entry.expires_at -= Duration::seconds(secs);
        }
    }
}
