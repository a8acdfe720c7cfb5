//! Connector traits.
//!
//! A connector is the object the broker holds for one configured upstream.
//! It is built once at startup from validated configuration and then shared
//! by all concurrent login requests, so implementations must be
//! `Send + Sync` and keep no per-request state.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::oneshot;
use url::Url;

use crate::error::ConnectorResult;
use crate::identity::Identity;
use crate::template::TemplateSet;

// ============================================================================
// Login Callback
// ============================================================================

/// Host hook invoked after a connector has verified a user.
///
/// The host records the identity against the broker session and answers
/// with the URL the browser should be sent to next.
#[async_trait]
pub trait LoginCallback: Send + Sync {
    /// Completes a login for the given session.
    ///
    /// ## Errors
    ///
    /// Returns an error if the session is unknown or cannot be updated.
    async fn login(&self, identity: Identity, session_key: &str) -> ConnectorResult<String>;
}

/// Shared handle to the host login callback.
pub type LoginFn = Arc<dyn LoginCallback>;

// ============================================================================
// Connector
// ============================================================================

/// A credential-verifying upstream as seen by the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the configured connector id.
    fn id(&self) -> &str;

    /// Checks that the upstream is reachable.
    ///
    /// Does not authenticate anyone.
    async fn healthy(&self) -> ConnectorResult<()>;

    /// Builds the URL the broker redirects the browser to for a login.
    ///
    /// ## Errors
    ///
    /// Returns an error if the URL cannot be built.
    fn login_url(&self, session_key: &str, prompt: &str) -> ConnectorResult<String>;

    /// Mounts the connector's HTTP routes on the host router.
    ///
    /// `error_url` is where the browser is sent when a login cannot proceed
    /// for reasons the user cannot fix.
    fn register_routes(self: Arc<Self>, router: Router, error_url: Url) -> Router;

    /// Returns the stop signal for background synchronization.
    ///
    /// Dropping or firing the sender stops the connector's sync task.
    /// Connectors without background work return a sender nobody listens to.
    fn sync(&self) -> oneshot::Sender<()>;

    /// Whether the broker may treat emails from this upstream as verified.
    fn is_trusted_email_provider(&self) -> bool;
}

// ============================================================================
// Connector Config
// ============================================================================

/// Parsed configuration for one connector instance.
pub trait ConnectorConfig: Send + Sync + Debug {
    /// Returns the configured connector id.
    fn connector_id(&self) -> &str;

    /// Returns the connector type tag.
    fn connector_type(&self) -> &'static str;

    /// Validates the configuration and builds the connector.
    ///
    /// `namespace` is the base URL under which the connector mounts its
    /// routes.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if validation fails or a required
    /// template is missing from `templates`.
    fn build(
        &self,
        namespace: Url,
        login: LoginFn,
        templates: &TemplateSet,
    ) -> ConnectorResult<Arc<dyn Connector>>;
}
