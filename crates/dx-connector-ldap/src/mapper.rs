//! Maps directory entries to broker identities.

use std::collections::BTreeMap;

use dx_connector::{Claims, Identity};

use crate::config::LdapConfig;
use crate::search::DirectoryEntry;

/// Maps a directory entry's attributes to an [`Identity`].
#[derive(Debug, Clone)]
pub struct IdentityMapper {
    name_attribute: String,
    email_attribute: String,
    /// Directory attribute name to claim name.
    claim_sources: BTreeMap<String, String>,
}

impl IdentityMapper {
    /// Creates a mapper from the resolved configuration.
    #[must_use]
    pub fn new(config: &LdapConfig) -> Self {
        Self {
            name_attribute: config.name_attribute.clone(),
            email_attribute: config.email_attribute.clone(),
            claim_sources: config.attributes.clone(),
        }
    }

    /// Maps an entry found by the user search.
    ///
    /// The subject id is the entry DN. Name and email take the first value
    /// of their attributes. Every configured claim source present on the
    /// entry contributes all its values under the destination claim name;
    /// sources mapped to the same claim are concatenated in source-name
    /// order.
    #[must_use]
    pub fn map_entry(&self, entry: &DirectoryEntry) -> Identity {
        Identity::new(entry.dn.clone())
            .with_name(entry.get_attr(&self.name_attribute).unwrap_or_default())
            .with_email(entry.get_attr(&self.email_attribute).unwrap_or_default())
            .with_claims(self.map_claims(entry))
    }

    /// Collects the configured claims from an entry.
    #[must_use]
    pub fn map_claims(&self, entry: &DirectoryEntry) -> Claims {
        let mut claims = Claims::new();
        for (source, claim) in &self.claim_sources {
            if let Some(values) = entry.get_attrs(source).filter(|v| !v.is_empty()) {
                claims
                    .entry(claim.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }
        claims
    }
}
