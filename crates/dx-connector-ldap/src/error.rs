//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak passwords or bind credentials.
//! [`LdapError::AuthRejected`] carries no detail at all, so a wrong password
//! and an unknown DN are indistinguishable to the caller.

use dx_connector::ConnectorError;
use thiserror::Error;

/// LDAP result codes the connector cares about (RFC 4511 section 4.1.9).
pub mod result_code {
    /// Operation completed.
    pub const SUCCESS: u32 = 0;
    /// Bind method not allowed, e.g. anonymous bind disabled.
    pub const INAPPROPRIATE_AUTHENTICATION: u32 = 48;
    /// Wrong DN or password.
    pub const INVALID_CREDENTIALS: u32 = 49;
    /// Caller lacks the rights for the operation.
    pub const INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;
    /// Server refuses the operation by policy.
    pub const UNWILLING_TO_PERFORM: u32 = 53;
}

/// LDAP connector errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration, including unusable certificate material.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Dial, StartTLS or transport failure.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// A directory operation did not finish within the configured timeout.
    #[error("LDAP operation timed out")]
    Timeout,

    /// The server answered a service operation with a non-success result code.
    #[error("LDAP server rejected the operation (rc={code}): {message}")]
    Rejected {
        /// LDAP result code.
        code: u32,
        /// Diagnostic text from the server.
        message: String,
    },

    /// The expanded search filter does not parse.
    #[error("malformed search filter: '{filter}'")]
    InvalidFilter {
        /// Expanded search filter, empty when not known.
        filter: String,
    },

    /// The client library failed outside the transport.
    #[error("LDAP protocol error: {0}")]
    Protocol(String),

    /// The user search found no entry.
    #[error("search returned no match: filter='{filter}' base='{base}'")]
    NoMatch {
        /// Expanded search filter.
        filter: String,
        /// Search base DN.
        base: String,
    },

    /// The user bind was rejected.
    #[error("invalid username or password")]
    AuthRejected,
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(code: u32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }

    /// Checks if the end user is to blame.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthRejected | Self::NoMatch { .. })
    }

    /// Checks if the server refused the operation by result code.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl From<ldap3::LdapError> for LdapError {
    fn from(err: ldap3::LdapError) -> Self {
        use ldap3::LdapError as E;

        match err {
            E::Timeout { .. } => Self::Timeout,
            E::Io { .. }
            | E::NativeTLS { .. }
            | E::OpSend { .. }
            | E::ResultRecv { .. }
            | E::IdScrubSend { .. }
            | E::MiscSend { .. }
            | E::EndOfStream => Self::Connection(err.to_string()),
            E::FilterParsing => Self::InvalidFilter {
                filter: String::new(),
            },
            E::LdapResult { result } => Self::Rejected {
                code: result.rc,
                message: result.text,
            },
            E::EmptyUnixPath
            | E::PortInUnixPath
            | E::UrlParsing { .. }
            | E::UnknownScheme(_)
            | E::InvalidScopeString(_)
            | E::UnrecognizedCriticalExtension(_) => Self::Configuration(err.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for ConnectorError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => Self::Configuration(msg),
            LdapError::Connection(_) | LdapError::Timeout => Self::Unavailable(err.to_string()),
            LdapError::Rejected { .. }
            | LdapError::InvalidFilter { .. }
            | LdapError::Protocol(_) => Self::Internal(err.to_string()),
            LdapError::NoMatch { .. } => Self::NoMatch(err.to_string()),
            LdapError::AuthRejected => Self::AuthRejected,
        }
    }
}
