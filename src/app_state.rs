//! Shared application state injected into all Axum handlers.

use crate::connection::AdapterSettings;
use crate::hub::HubHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Channel API of the running hub.
    pub hub: HubHandle,
    /// Settings applied to every new connection adapter.
    pub adapter_settings: AdapterSettings,
}
