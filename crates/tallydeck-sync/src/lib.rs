//! Tallydeck Sync - Periodic metric refresh for device integrations
//!
//! A best-effort background sweep, fully decoupled from the auth core:
//! it only knows about device integrations and the publish transport.
//! Each sweep scans integrations that are due, fetches the latest metric
//! value through [`MetricFetcher`], and publishes changed values to the
//! device's integration topic through [`Publisher`]. One item's failure
//! is logged and skipped; the batch always completes.

pub mod integrations;
pub mod runner;

pub use integrations::{DeviceIntegration, IntegrationStore};
pub use runner::{LogPublisher, MetricFetcher, NullFetcher, Publisher, SyncRunner};
