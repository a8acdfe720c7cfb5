//! Normalized identity returned by connectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extra claims keyed by destination claim name.
///
/// Upstream attributes are multi-valued, so every claim carries a list.
pub type Claims = BTreeMap<String, Vec<String>>;

/// Identity produced by one successful login.
///
/// Built fresh per authentication and handed to the broker, which embeds it
/// in the tokens it issues. Never cached or mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier.
    pub id: String,

    /// Display name (may be empty).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Email address (may be empty).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    /// Additional claims.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: Claims,
}

impl Identity {
    /// Creates an identity carrying only a subject id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Replaces the extra claims.
    #[must_use]
    pub fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = claims;
        self
    }
}
