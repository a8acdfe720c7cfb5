//! LDAP connector configuration.
//!
//! Two types on purpose: [`LdapConnectorConfig`] is the raw record exactly as
//! the host reads it from JSON, and [`LdapConfig`] is the validated,
//! fully-defaulted value the rest of the crate works with. The only way to
//! get an [`LdapConfig`] is [`LdapConnectorConfig::resolve`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{LdapError, LdapResult};

/// Attribute holding the display name when none is configured.
pub const DEFAULT_NAME_ATTRIBUTE: &str = "cn";

/// Attribute holding the email address when none is configured.
pub const DEFAULT_EMAIL_ATTRIBUTE: &str = "mail";

/// Bind DN template used for direct binds when none is configured.
pub const DEFAULT_BIND_TEMPLATE: &str = "uid=%u,%b";

/// Per-operation timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const LDAP_PORT: u16 = 389;
const LDAPS_PORT: u16 = 636;

// ============================================================================
// Security Mode
// ============================================================================

/// Transport security for the directory connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// Plain LDAP.
    #[default]
    None,
    /// TLS from the first byte (`ldaps://`).
    Implicit,
    /// Plain connect followed by StartTLS.
    Upgrade,
}

impl SecurityMode {
    /// Whether certificate material is used at all.
    #[must_use]
    pub const fn uses_tls(self) -> bool {
        !matches!(self, Self::None)
    }

    /// URL scheme to dial with.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Implicit => "ldaps",
            Self::None | Self::Upgrade => "ldap",
        }
    }

    /// Port used when the config leaves it unset.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Implicit => LDAPS_PORT,
            Self::None | Self::Upgrade => LDAP_PORT,
        }
    }
}

// ============================================================================
// Search Scope
// ============================================================================

/// LDAP search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Search only the base DN.
    Base,
    /// Search one level below the base DN.
    OneLevel,
    /// Search the entire subtree.
    #[default]
    Subtree,
}

impl SearchScope {
    /// Converts to ldap3 scope.
    #[must_use]
    pub const fn to_ldap3(self) -> ldap3::Scope {
        match self {
            Self::Base => ldap3::Scope::Base,
            Self::OneLevel => ldap3::Scope::OneLevel,
            Self::Subtree => ldap3::Scope::Subtree,
        }
    }
}

impl FromStr for SearchScope {
    type Err = LdapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("base") {
            Ok(Self::Base)
        } else if s.eq_ignore_ascii_case("one") {
            Ok(Self::OneLevel)
        } else if s.eq_ignore_ascii_case("sub") {
            Ok(Self::Subtree)
        } else {
            Err(LdapError::config(format!(
                "invalid value for searchScope: '{s}'. Must be one of 'base', 'one' or 'sub'"
            )))
        }
    }
}

// ============================================================================
// Raw Configuration
// ============================================================================

/// LDAP connector configuration as read from the host's connector list.
///
/// Every key is optional; missing keys take their zero value and are
/// defaulted by [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LdapConnectorConfig {
    /// Connector id.
    pub id: String,

    /// Directory host name (also the TLS server name).
    pub server_host: String,

    /// Directory port; 0 picks 389 or 636 from the security mode.
    pub server_port: u16,

    /// Per-operation timeout in milliseconds; 0 uses [`DEFAULT_TIMEOUT`].
    pub timeout: u64,

    /// Upgrade the connection with StartTLS.
    #[serde(rename = "useTLS")]
    pub use_tls: bool,

    /// Connect with TLS from the start.
    #[serde(rename = "useSSL")]
    pub use_ssl: bool,

    /// PEM client certificate path.
    pub cert_file: String,

    /// PEM client key path (PKCS#8).
    pub key_file: String,

    /// PEM trusted root bundle path.
    pub ca_file: String,

    /// Accept any server certificate.
    pub skip_cert_verification: bool,

    /// Base DN substituted for `%b` and used as the search base.
    #[serde(rename = "baseDN")]
    pub base_dn: String,

    /// Attribute holding the display name.
    pub name_attribute: String,

    /// Attribute holding the email address.
    pub email_attribute: String,

    /// Search for the user's DN before binding.
    pub search_before_auth: bool,

    /// Search filter template.
    pub search_filter: String,

    /// Search scope: `base`, `one` or `sub`.
    pub search_scope: String,

    /// DN to bind as for the search; empty for anonymous.
    #[serde(rename = "searchBindDN")]
    pub search_bind_dn: String,

    /// Password for the search bind.
    pub search_bind_pw: Option<SecretString>,

    /// Bind DN template for direct binds.
    pub bind_template: String,

    /// Whether the broker may treat emails from this directory as verified.
    pub trusted_email_provider: bool,

    /// Directory attribute name to claim name.
    pub attributes: BTreeMap<String, String>,
}

impl LdapConnectorConfig {
    /// Validates the record and applies defaults.
    ///
    /// Pure: opens no connections and reads no files.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if:
    /// - `useTLS` and `useSSL` are both set
    /// - only one of `certFile` and `keyFile` is set
    /// - `searchScope` is not `base`, `one` or `sub`
    /// - `serverHost` is empty
    /// - `searchBeforeAuth` is set without a `searchFilter`
    pub fn resolve(&self) -> LdapResult<LdapConfig> {
        if self.use_tls && self.use_ssl {
            return Err(LdapError::config(
                "useTLS and useSSL are mutually exclusive",
            ));
        }

        if self.cert_file.is_empty() != self.key_file.is_empty() {
            return Err(LdapError::config(
                "both certFile and keyFile must be specified",
            ));
        }

        let scope = if self.search_scope.is_empty() {
            SearchScope::default()
        } else {
            self.search_scope.parse()?
        };

        if !self.bind_template.is_empty() && self.search_before_auth {
            tracing::warn!(
                connector_id = %self.id,
                "bindTemplate not used when searchBeforeAuth specified"
            );
        }

        if self.server_host.trim().is_empty() {
            return Err(LdapError::config("serverHost cannot be empty"));
        }

        let security = if self.use_ssl {
            SecurityMode::Implicit
        } else if self.use_tls {
            SecurityMode::Upgrade
        } else {
            SecurityMode::None
        };

        let strategy = if self.search_before_auth {
            if self.search_filter.is_empty() {
                return Err(LdapError::config(
                    "searchFilter is required when searchBeforeAuth is set",
                ));
            }
            AuthStrategy::SearchThenBind(SearchSettings {
                filter: self.search_filter.clone(),
                scope,
                bind_dn: self.search_bind_dn.clone(),
                bind_password: self
                    .search_bind_pw
                    .clone()
                    .unwrap_or_else(|| SecretString::from(String::new())),
            })
        } else {
            AuthStrategy::DirectBind {
                bind_template: non_empty_or(&self.bind_template, DEFAULT_BIND_TEMPLATE),
            }
        };

        let name_attribute = non_empty_or(&self.name_attribute, DEFAULT_NAME_ATTRIBUTE);
        let email_attribute = non_empty_or(&self.email_attribute, DEFAULT_EMAIL_ATTRIBUTE);

        let mut search_attributes = vec![name_attribute.clone(), email_attribute.clone()];
        for source in self.attributes.keys() {
            if !search_attributes.contains(source) {
                search_attributes.push(source.clone());
            }
        }

        Ok(LdapConfig {
            id: self.id.clone(),
            host: self.server_host.trim().to_string(),
            port: if self.server_port == 0 {
                security.default_port()
            } else {
                self.server_port
            },
            timeout: if self.timeout == 0 {
                DEFAULT_TIMEOUT
            } else {
                Duration::from_millis(self.timeout)
            },
            security,
            tls: TlsSettings {
                cert_file: non_empty_path(&self.cert_file),
                key_file: non_empty_path(&self.key_file),
                ca_file: non_empty_path(&self.ca_file),
                skip_verification: self.skip_cert_verification,
            },
            base_dn: self.base_dn.clone(),
            name_attribute,
            email_attribute,
            strategy,
            attributes: self.attributes.clone(),
            search_attributes,
            trusted_email_provider: self.trusted_email_provider,
        })
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Certificate material for TLS connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM client certificate path. Set only together with `key_file`.
    pub cert_file: Option<PathBuf>,
    /// PEM client key path. Set only together with `cert_file`.
    pub key_file: Option<PathBuf>,
    /// PEM trusted root bundle path.
    pub ca_file: Option<PathBuf>,
    /// Accept any server certificate.
    pub skip_verification: bool,
}

/// Settings for the search-then-bind strategy.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Filter template (`%u`, `%b`).
    pub filter: String,
    /// Search scope below the base DN.
    pub scope: SearchScope,
    /// DN for the search bind; empty for anonymous.
    pub bind_dn: String,
    /// Password for the search bind.
    pub bind_password: SecretString,
}

/// How a username is turned into a bind DN.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Expand a DN template and bind with it directly.
    DirectBind {
        /// DN template (`%u`, `%b`).
        bind_template: String,
    },
    /// Search for the user's entry, then bind as its DN.
    SearchThenBind(SearchSettings),
}

impl AuthStrategy {
    /// Whether a directory search runs before the user bind.
    #[must_use]
    pub const fn searches(&self) -> bool {
        matches!(self, Self::SearchThenBind(_))
    }
}

/// Validated LDAP connector configuration.
///
/// Cannot be built outside this crate; use [`LdapConnectorConfig::resolve`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LdapConfig {
    /// Connector id.
    pub id: String,
    /// Directory host.
    pub host: String,
    /// Directory port.
    pub port: u16,
    /// Bound on every directory operation.
    pub timeout: Duration,
    /// Transport security.
    pub security: SecurityMode,
    /// Certificate material, used only when `security` uses TLS.
    pub tls: TlsSettings,
    /// Base DN.
    pub base_dn: String,
    /// Attribute holding the display name.
    pub name_attribute: String,
    /// Attribute holding the email address.
    pub email_attribute: String,
    /// Authentication strategy.
    pub strategy: AuthStrategy,
    /// Directory attribute name to claim name.
    pub attributes: BTreeMap<String, String>,
    /// Attributes requested by the user search: name, email, then every
    /// claim source.
    pub search_attributes: Vec<String>,
    /// Whether emails from this directory count as verified.
    pub trusted_email_provider: bool,
}

impl LdapConfig {
    /// Returns the directory URL to dial.
    #[must_use]
    pub fn url(&self) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}://{}:{}", self.security.scheme(), host, self.port)
    }
}
