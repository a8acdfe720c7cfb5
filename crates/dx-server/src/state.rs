//! Host state shared by the health and login-start handlers.

use std::sync::Arc;

use dx_connector::Connector;

use crate::config::ServerConfig;

/// Configuration and the connectors built from it.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,

    /// Built connectors, in configuration order.
    pub connectors: Arc<[Arc<dyn Connector>]>,
}

impl AppState {
    /// Wraps the built connectors for sharing between handlers.
    pub fn new(config: ServerConfig, connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self {
            config,
            connectors: connectors.into(),
        }
    }

    /// Looks up a connector by id.
    #[must_use]
    pub fn connector(&self, id: &str) -> Option<&Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.id() == id)
    }

    /// Returns the server configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }
}
