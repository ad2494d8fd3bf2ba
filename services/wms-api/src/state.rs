//! Shared application state.

use map_config::{ConfigResult, MapConfig};
use wms_protocol::Backends;

use crate::backends::{DefaultBackends, LocalQueryEngine};

/// The master map configuration plus the default collaborators.
///
/// The master map is immutable after startup; every request works on a deep
/// copy obtained from [`AppState::map_for_request`].
pub struct AppState {
    master: MapConfig,
    backends: DefaultBackends,
}

impl AppState {
    pub fn new(master: MapConfig, query: LocalQueryEngine) -> Self {
        Self {
            master,
            backends: DefaultBackends::new(query),
        }
    }

    /// Deep-copy the master configuration for one request.
    pub fn map_for_request(&self) -> ConfigResult<MapConfig> {
        self.master.clone_for_request()
    }

    pub fn master(&self) -> &MapConfig {
        &self.master
    }

    pub fn backends(&self) -> Backends<'_> {
        self.backends.as_backends()
    }
}
