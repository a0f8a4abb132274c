//! Core types shared across the Tallydeck server
//!
//! Holds the runtime configuration and the MQTT topic/payload contract
//! between the server and device firmware. No business logic lives here.

pub mod config;
pub mod topics;

pub use config::{BrokerConfig, Config, SignatureMode};
pub use topics::{DeviceTopics, IntegrationUpdate};
