//! Directory search requests and results.

use std::collections::HashMap;

use ldap3::SearchEntry;

use crate::config::SearchScope;

/// A user search as issued by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base DN.
    pub base: String,
    /// Search scope.
    pub scope: SearchScope,
    /// Expanded filter.
    pub filter: String,
    /// Attributes to return.
    pub attributes: Vec<String>,
}

/// Directory entry with its text attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Gets the first value of an attribute.
    ///
    /// Attribute names are matched case-insensitively, as LDAP does.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets all values of an attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, values)| values)
        })
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }
}
