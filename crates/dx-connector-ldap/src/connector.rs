//! The LDAP connector as seen by the broker.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use dx_connector::{
    Connector, ConnectorConfig, ConnectorError, ConnectorResult, Identity, LoginFn, LoginPage,
    TemplateSet,
};
use tokio::sync::oneshot;
use url::Url;

use crate::authenticator::Authenticator;
use crate::config::{LdapConfig, LdapConnectorConfig};
use crate::connection::{ConnectionFactory, LdapConnectionFactory};
use crate::error::{LdapError, LdapResult};
use crate::login::{self, LOGIN_PAGE_TEMPLATE};

/// Connector type tag in the host's connector list.
pub const CONNECTOR_TYPE: &str = "ldap";

/// Parses a raw connector record.
///
/// ## Errors
///
/// Returns a configuration error if the record does not match the LDAP
/// configuration shape.
pub fn parse_config(raw: serde_json::Value) -> ConnectorResult<Box<dyn ConnectorConfig>> {
    let config: LdapConnectorConfig = serde_json::from_value(raw)
        .map_err(|e| ConnectorError::config(format!("invalid {CONNECTOR_TYPE} connector config: {e}")))?;
    Ok(Box::new(config))
}

impl ConnectorConfig for LdapConnectorConfig {
    fn connector_id(&self) -> &str {
        &self.id
    }

    fn connector_type(&self) -> &'static str {
        CONNECTOR_TYPE
    }

    fn build(
        &self,
        namespace: Url,
        login: LoginFn,
        templates: &TemplateSet,
    ) -> ConnectorResult<Arc<dyn Connector>> {
        let connector = LdapConnector::new(self.resolve()?, &namespace, login, templates)?;
        Ok(Arc::new(connector))
    }
}

fn login_page(templates: &TemplateSet) -> LdapResult<Arc<dyn LoginPage>> {
    templates.lookup(LOGIN_PAGE_TEMPLATE).ok_or_else(|| {
        LdapError::config(format!(
            "unable to find necessary HTML template {LOGIN_PAGE_TEMPLATE}"
        ))
    })
}

/// LDAP password connector.
///
/// Stateless between requests: every login opens its own directory
/// connection, so one instance serves concurrent logins without locking.
pub struct LdapConnector<F = LdapConnectionFactory> {
    id: String,
    authenticator: Authenticator<F>,
    login_path: String,
    login: LoginFn,
    page: Arc<dyn LoginPage>,
    trusted_email_provider: bool,
}

impl LdapConnector {
    /// Creates a connector that dials the configured directory.
    ///
    /// `namespace` is the base URL the login route is mounted under.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the login page is missing from
    /// `templates` or the TLS material cannot be loaded.
    pub fn new(
        config: LdapConfig,
        namespace: &Url,
        login: LoginFn,
        templates: &TemplateSet,
    ) -> LdapResult<Self> {
        let page = login_page(templates)?;
        let factory = LdapConnectionFactory::new(&config)?;
        Ok(Self::assemble(config, factory, namespace, login, page))
    }
}

impl<F: ConnectionFactory> LdapConnector<F> {
    /// Creates a connector on top of a custom connection factory.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the login page is missing from
    /// `templates`.
    pub fn with_factory(
        config: LdapConfig,
        factory: F,
        namespace: &Url,
        login: LoginFn,
        templates: &TemplateSet,
    ) -> LdapResult<Self> {
        let page = login_page(templates)?;
        Ok(Self::assemble(config, factory, namespace, login, page))
    }

    fn assemble(
        config: LdapConfig,
        factory: F,
        namespace: &Url,
        login: LoginFn,
        page: Arc<dyn LoginPage>,
    ) -> Self {
        let login_path = format!("{}/login", namespace.path().trim_end_matches('/'));
        let strategy = if config.strategy.searches() {
            "search-then-bind"
        } else {
            "direct-bind"
        };
        tracing::info!(
            connector_id = %config.id,
            url = %config.url(),
            strategy,
            login_path = %login_path,
            "Configured LDAP connector"
        );

        Self {
            id: config.id.clone(),
            trusted_email_provider: config.trusted_email_provider,
            authenticator: Authenticator::new(Arc::new(config), factory),
            login_path,
            login,
            page,
        }
    }

    /// Returns the configured id.
    #[must_use]
    pub fn connector_id(&self) -> &str {
        &self.id
    }

    /// Returns the authenticator.
    #[must_use]
    pub const fn authenticator(&self) -> &Authenticator<F> {
        &self.authenticator
    }

    /// Returns the path of the login route.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub(crate) fn login_page(&self) -> &dyn LoginPage {
        self.page.as_ref()
    }

    /// Hands a verified identity to the host and returns where to go next.
    pub(crate) async fn complete_login(
        &self,
        identity: Identity,
        session_key: &str,
    ) -> ConnectorResult<String> {
        self.login.login(identity, session_key).await
    }
}

#[async_trait]
impl<F: ConnectionFactory + 'static> Connector for LdapConnector<F> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn healthy(&self) -> ConnectorResult<()> {
        self.authenticator
            .check_connection()
            .await
            .map_err(ConnectorError::from)
    }

    fn login_url(&self, session_key: &str, prompt: &str) -> ConnectorResult<String> {
        let query = serde_urlencoded::to_string([("prompt", prompt), ("session_key", session_key)])
            .map_err(|e| ConnectorError::internal(format!("encode login URL: {e}")))?;
        Ok(format!("{}?{query}", self.login_path))
    }

    fn register_routes(self: Arc<Self>, router: Router, error_url: Url) -> Router {
        router.merge(login::routes(self, error_url))
    }

    fn sync(&self) -> oneshot::Sender<()> {
        let (stop, _) = oneshot::channel();
        stop
    }

    fn is_trusted_email_provider(&self) -> bool {
        self.trusted_email_provider
    }
}
