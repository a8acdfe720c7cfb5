//! # dx-connector-ldap
//!
//! LDAP password connector for the identity broker.
//!
//! Verifies a username and password by binding against a directory server,
//! either with a DN built from a template or with the DN of an entry found
//! by a search, and maps the entry to a broker [`Identity`](dx_connector::Identity).
//!
//! ## Security Requirements
//!
//! - Passwords are never logged
//! - Wrong password and unknown user are indistinguishable to callers
//! - Usernames are substituted into DNs and filters unescaped; see
//!   [`template::expand`]
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ConnectorRegistry::new()
//!     .with_type(dx_connector_ldap::CONNECTOR_TYPE, dx_connector_ldap::parse_config);
//! let config = registry.parse_entry(raw)?;
//! let connector = config.build(namespace, login, &dx_connector_ldap::login_templates())?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authenticator;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod login;
pub mod mapper;
pub mod search;
pub mod template;

pub use authenticator::{AuthState, Authenticator, RebindDecision};
pub use config::{
    AuthStrategy, LdapConfig, LdapConnectorConfig, SearchScope, SearchSettings, SecurityMode,
    TlsSettings,
};
pub use connection::{ConnectionFactory, DirectoryConnection, LdapConnection, LdapConnectionFactory};
pub use connector::{parse_config, LdapConnector, CONNECTOR_TYPE};
pub use error::{LdapError, LdapResult};
pub use login::{login_templates, LdapLoginPage, INVALID_CREDENTIALS_MESSAGE, LOGIN_PAGE_TEMPLATE};
pub use mapper::IdentityMapper;
pub use search::{DirectoryEntry, SearchRequest};
