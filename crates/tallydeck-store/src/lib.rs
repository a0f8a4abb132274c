//! Tallydeck Store - Durable device entities
//!
//! JSON-file backed stores for the two persistent entities:
//!
//! - [`DeviceKeyStore`]: pre-provisioned device identities (UUID + public
//!   key) created at manufacturing time, with a one-time activation flag.
//! - [`DeviceStore`]: device records created on first successful
//!   verification and updated through the pairing and heartbeat paths.
//!
//! Each store keeps an in-memory map behind a `tokio::sync::RwLock` and
//! writes the whole file on every mutation. Store failures (I/O, bad JSON)
//! are infrastructure errors and propagate; they are never reported as
//! "not found".

pub mod device;
pub mod devices;
pub mod keys;

pub use device::{Device, DeviceMetadata, DeviceStatus, DeviceSummary};
pub use devices::DeviceStore;
pub use keys::{DeviceKey, DeviceKeyStore};

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Device not found: {0}")]
    NotFound(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
