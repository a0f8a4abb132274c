//! Configuration types for Tallydeck

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How device signatures are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureMode {
    /// ECDSA P-256 signatures from the device secure element
    #[default]
    Ecdsa,
    /// Simulated signatures for firmware without a secure element.
    /// Never enabled in production wiring.
    Simulated,
}

impl std::str::FromStr for SignatureMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ecdsa" | "p256" => Ok(SignatureMode::Ecdsa),
            "simulated" | "dev" => Ok(SignatureMode::Simulated),
            _ => Err(format!("Invalid signature mode: {}. Use: ecdsa, simulated", s)),
        }
    }
}

/// MQTT broker address handed to devices after verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname devices should connect to
    pub host: String,
    /// Broker port
    pub port: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
        }
    }
}

/// Main configuration for the Tallydeck server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API port
    pub port: u16,
    /// Directory holding the JSON store files
    pub data_dir: PathBuf,
    /// MQTT broker devices are directed to
    pub broker: BrokerConfig,
    /// Seconds between integration sync sweeps
    pub sync_interval_secs: u64,
    /// Signature verification strategy
    pub signature_mode: SignatureMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("."),
            broker: BrokerConfig::default(),
            sync_interval_secs: 60,
            signature_mode: SignatureMode::Ecdsa,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set HTTP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set data directory
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    /// Builder pattern: set broker address
    pub fn with_broker(mut self, host: String, port: u16) -> Self {
        self.broker = BrokerConfig { host, port };
        self
    }

    /// Builder pattern: set sync interval
    pub fn with_sync_interval(mut self, secs: u64) -> Self {
        self.sync_interval_secs = secs;
        self
    }

    /// Builder pattern: set signature mode
    pub fn with_signature_mode(mut self, mode: SignatureMode) -> Self {
        self.signature_mode = mode;
        self
    }

    /// Path to the device record store file
    pub fn devices_path(&self) -> PathBuf {
        self.data_dir.join("devices.json")
    }

    /// Path to the device key registry file
    pub fn keys_path(&self) -> PathBuf {
        self.data_dir.join("device_keys.json")
    }
}
