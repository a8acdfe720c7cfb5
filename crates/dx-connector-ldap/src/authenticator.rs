//! Username/password verification against the directory.
//!
//! One attempt walks `Idle -> Connected -> (Searching) -> Authenticating`
//! and ends in `Success` or `Failed`. Each attempt owns a fresh connection
//! and closes it exactly once, whichever way it ends.
//!
//! ## Security
//!
//! - Passwords are never logged.
//! - A rejected user bind always surfaces as [`LdapError::AuthRejected`],
//!   whatever result code the server sent, so callers cannot learn which
//!   DNs exist.
//! - An empty password is rejected up front. LDAP treats a simple bind
//!   with an empty password as an unauthenticated bind that succeeds.

use std::sync::Arc;

use dx_connector::Identity;
use secrecy::ExposeSecret;

use crate::config::{AuthStrategy, LdapConfig, SearchSettings};
use crate::connection::{ConnectionFactory, DirectoryConnection};
use crate::error::{LdapError, LdapResult};
use crate::mapper::IdentityMapper;
use crate::search::SearchRequest;
use crate::template::expand;

/// Stage of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing done yet.
    Idle,
    /// Connection open.
    Connected,
    /// Looking up the user's entry.
    Searching,
    /// Binding as the user.
    Authenticating,
    /// User verified.
    Success,
    /// Attempt ended with an error.
    Failed,
}

impl AuthState {
    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Searching => "searching",
            Self::Authenticating => "authenticating",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// What to do with the search connection before the user bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebindDecision {
    /// Anonymous bind worked; keep the connection.
    Reuse,
    /// Anonymous bind failed; swap in a fresh connection.
    Reconnect,
}

impl RebindDecision {
    /// Decides from the outcome of the anonymous bind.
    ///
    /// Directories that disallow anonymous binds answer with a rejection;
    /// some drop the connection instead. Both are recovered by reconnecting.
    #[must_use]
    pub fn after_anonymous_bind(outcome: &LdapResult<()>) -> Self {
        match outcome {
            Ok(()) => Self::Reuse,
            Err(_) => Self::Reconnect,
        }
    }
}

/// Verifies credentials with the configured strategy.
pub struct Authenticator<F> {
    config: Arc<LdapConfig>,
    factory: F,
    mapper: IdentityMapper,
}

impl<F: ConnectionFactory> Authenticator<F> {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>, factory: F) -> Self {
        let mapper = IdentityMapper::new(&config);
        Self {
            config,
            factory,
            mapper,
        }
    }

    /// Opens and closes a connection without binding.
    ///
    /// ## Errors
    ///
    /// Returns a connection-class error if the directory is unreachable.
    pub async fn check_connection(&self) -> LdapResult<()> {
        let conn = self.factory.connect().await?;
        conn.close().await;
        Ok(())
    }

    /// Verifies a username and password.
    ///
    /// ## Errors
    ///
    /// - [`LdapError::AuthRejected`] if the password is empty or the user
    ///   bind is refused
    /// - [`LdapError::NoMatch`] if the user search finds nothing or the
    ///   expanded filter does not parse
    /// - [`LdapError::Rejected`] if the search bind or the search is refused
    /// - [`LdapError::Connection`] or [`LdapError::Timeout`] on transport failure
    pub async fn authenticate(&self, username: &str, password: &str) -> LdapResult<Identity> {
        self.enter(AuthState::Idle, username);

        if password.is_empty() {
            tracing::debug!(
                connector_id = %self.config.id,
                username = %username,
                "Rejecting empty password"
            );
            self.enter(AuthState::Failed, username);
            return Err(LdapError::AuthRejected);
        }

        let mut conn = match self.factory.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                self.enter(AuthState::Failed, username);
                return Err(e);
            }
        };
        self.enter(AuthState::Connected, username);

        let result = self.run(&mut conn, username, password).await;
        conn.close().await;

        match &result {
            Ok(_) => self.enter(AuthState::Success, username),
            Err(e) => {
                self.enter(AuthState::Failed, username);
                tracing::debug!(
                    connector_id = %self.config.id,
                    username = %username,
                    error = %e,
                    "LDAP login failed"
                );
            }
        }
        result
    }

    async fn run(
        &self,
        conn: &mut F::Connection,
        username: &str,
        password: &str,
    ) -> LdapResult<Identity> {
        let identity = match &self.config.strategy {
            AuthStrategy::DirectBind { bind_template } => {
                Identity::new(expand(bind_template, username, &self.config.base_dn))
            }
            AuthStrategy::SearchThenBind(search) => {
                self.enter(AuthState::Searching, username);
                let identity = self.search_user(conn, search, username).await?;
                self.drop_to_anonymous(conn).await?;
                identity
            }
        };

        self.enter(AuthState::Authenticating, username);
        conn.bind(&identity.id, password).await.map_err(|e| match e {
            LdapError::Rejected { code, .. } => {
                tracing::debug!(
                    connector_id = %self.config.id,
                    code,
                    "User bind rejected"
                );
                LdapError::AuthRejected
            }
            other => other,
        })?;

        Ok(identity)
    }

    async fn search_user(
        &self,
        conn: &mut F::Connection,
        search: &SearchSettings,
        username: &str,
    ) -> LdapResult<Identity> {
        conn.bind(&search.bind_dn, search.bind_password.expose_secret())
            .await
            .inspect_err(|e| {
                if e.is_rejection() {
                    tracing::error!(
                        connector_id = %self.config.id,
                        bind_dn = %search.bind_dn,
                        error = %e,
                        "Search bind rejected"
                    );
                }
            })?;

        let request = SearchRequest {
            base: self.config.base_dn.clone(),
            scope: search.scope,
            filter: expand(&search.filter, username, &self.config.base_dn),
            attributes: self.config.search_attributes.clone(),
        };

        let entries = match conn.search(&request).await {
            Ok(entries) => entries,
            // A username with filter metacharacters can break the expanded
            // filter; no entry can match it.
            Err(LdapError::InvalidFilter { .. }) => {
                tracing::warn!(
                    connector_id = %self.config.id,
                    filter = %request.filter,
                    "Search filter does not parse"
                );
                return Err(LdapError::NoMatch {
                    filter: request.filter,
                    base: request.base,
                });
            }
            Err(e) => return Err(e),
        };
        if entries.len() > 1 {
            tracing::warn!(
                connector_id = %self.config.id,
                filter = %request.filter,
                matches = entries.len(),
                "Search returned multiple matches, using the first"
            );
        }

        let entry = entries.into_iter().next().ok_or(LdapError::NoMatch {
            filter: request.filter,
            base: request.base,
        })?;

        Ok(self.mapper.map_entry(&entry))
    }

    /// Resets the search bind so the user bind starts from a clean session.
    async fn drop_to_anonymous(&self, conn: &mut F::Connection) -> LdapResult<()> {
        let outcome = conn.bind("", "").await;
        match RebindDecision::after_anonymous_bind(&outcome) {
            RebindDecision::Reuse => Ok(()),
            RebindDecision::Reconnect => {
                if let Err(e) = &outcome {
                    tracing::warn!(
                        connector_id = %self.config.id,
                        error = %e,
                        "Re-connecting to LDAP server after failure to bind anonymously"
                    );
                }
                let fresh = self.factory.connect().await?;
                let stale = std::mem::replace(conn, fresh);
                stale.close().await;
                Ok(())
            }
        }
    }

    fn enter(&self, state: AuthState, username: &str) {
        tracing::debug!(
            connector_id = %self.config.id,
            username = %username,
            state = state.as_str(),
            "LDAP login state"
        );
    }
}
