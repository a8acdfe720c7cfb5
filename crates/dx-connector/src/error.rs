//! Connector error types.
//!
//! ## Security Note
//!
//! These are the error classes the broker sees. Messages must not carry
//! passwords, bind credentials, or anything that lets a caller tell an
//! unknown user apart from a wrong password.

use thiserror::Error;

/// Errors surfaced by a connector to the host broker.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid or incomplete configuration. Fatal at construction.
    #[error("connector configuration error: {0}")]
    Configuration(String),

    /// The upstream service could not be reached or timed out.
    #[error("upstream service unavailable: {0}")]
    Unavailable(String),

    /// The upstream lookup found no matching account.
    #[error("no matching account: {0}")]
    NoMatch(String),

    /// The supplied credentials were rejected.
    #[error("invalid username or password")]
    AuthRejected,

    /// Internal failure (template rendering, callback failure, protocol fault).
    #[error("internal connector error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Checks if this is a connectivity failure.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
