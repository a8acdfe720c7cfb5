//! Connector loading and the development login callback.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dx_connector::{
    Connector, ConnectorRegistry, ConnectorResult, Identity, LoginCallback, LoginFn, TemplateSet,
};
use url::Url;

use crate::config::ServerConfig;

/// Returns the constructor table with every connector type this host knows.
#[must_use]
pub fn default_registry() -> ConnectorRegistry {
    ConnectorRegistry::new().with_type(dx_connector_ldap::CONNECTOR_TYPE, dx_connector_ldap::parse_config)
}

/// Returns the login pages shipped with the built-in connectors.
#[must_use]
pub fn default_templates() -> TemplateSet {
    TemplateSet::new().merge(dx_connector_ldap::login_templates())
}

/// Login callback that logs the verified identity and sends the browser to
/// the host's landing page.
#[derive(Debug, Clone)]
pub struct LoggingLoginCallback {
    done_url: Url,
}

impl LoggingLoginCallback {
    /// Creates a callback redirecting to `done_url`.
    #[must_use]
    pub const fn new(done_url: Url) -> Self {
        Self { done_url }
    }
}

#[async_trait]
impl LoginCallback for LoggingLoginCallback {
    async fn login(&self, identity: Identity, session_key: &str) -> ConnectorResult<String> {
        tracing::info!(
            subject = %identity.id,
            name = %identity.name,
            email = %identity.email,
            claims = identity.claims.len(),
            "Login completed"
        );

        let mut next = self.done_url.clone();
        next.query_pairs_mut().append_pair("session_key", session_key);
        Ok(next.to_string())
    }
}

/// Parses a connector list and builds every connector in it.
///
/// ## Errors
///
/// Returns an error if the document is malformed, an id repeats, or any
/// connector fails to build.
pub fn build_connectors(
    config: &ServerConfig,
    raw: serde_json::Value,
    registry: &ConnectorRegistry,
    login: &LoginFn,
    templates: &TemplateSet,
) -> anyhow::Result<Vec<Arc<dyn Connector>>> {
    let configs = registry.parse_all(raw)?;
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::with_capacity(configs.len());

    for cfg in configs {
        let id = cfg.connector_id();
        if id.is_empty() {
            anyhow::bail!("{} connector has no id", cfg.connector_type());
        }
        if connectors.iter().any(|c| c.id() == id) {
            anyhow::bail!("duplicate connector id '{id}'");
        }

        let connector = cfg
            .build(config.namespace(id)?, Arc::clone(login), templates)
            .map_err(|e| anyhow::anyhow!("connector '{id}': {e}"))?;
        tracing::info!(
            connector_id = %id,
            connector_type = cfg.connector_type(),
            "Connector ready"
        );
        connectors.push(connector);
    }

    Ok(connectors)
}

/// Reads the connector list file and builds every connector in it.
///
/// ## Errors
///
/// Returns an error if the file cannot be read or any connector fails.
pub fn load_connectors(
    config: &ServerConfig,
    path: &Path,
    login: &LoginFn,
) -> anyhow::Result<Vec<Arc<dyn Connector>>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;

    build_connectors(config, raw, &default_registry(), login, &default_templates())
}
