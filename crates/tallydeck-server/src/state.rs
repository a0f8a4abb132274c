//! Shared application state

use std::sync::Arc;
use tallydeck_auth::Authenticator;
use tallydeck_store::DeviceStore;
use tallydeck_sync::IntegrationStore;

/// State handed to every request handler
pub struct AppState {
    /// The auth/pairing orchestrator
    pub auth: Arc<Authenticator>,
    /// Device records, for listing endpoints
    pub devices: Arc<DeviceStore>,
    /// Device metric integrations, shared with the sync runner
    pub integrations: IntegrationStore,
}

impl AppState {
    pub fn new(
        auth: Arc<Authenticator>,
        devices: Arc<DeviceStore>,
        integrations: IntegrationStore,
    ) -> Self {
        Self {
            auth,
            devices,
            integrations,
        }
    }
}
