//! Constructor table for connector configurations.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::connector::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};

/// Parses a raw JSON record into a typed connector configuration.
pub type ConfigParser = fn(Value) -> ConnectorResult<Box<dyn ConnectorConfig>>;

/// Table mapping connector type tags to their config parsers.
///
/// Built explicitly by the host at startup; nothing registers itself.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    parsers: HashMap<&'static str, ConfigParser>,
}

impl ConnectorRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connector type.
    #[must_use]
    pub fn with_type(mut self, type_tag: &'static str, parser: ConfigParser) -> Self {
        self.parsers.insert(type_tag, parser);
        self
    }

    /// Lists the known type tags, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.parsers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Parses a config record of the given type.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the type is unknown or the record
    /// does not parse.
    pub fn parse(&self, type_tag: &str, raw: Value) -> ConnectorResult<Box<dyn ConnectorConfig>> {
        let parser = self
            .parsers
            .get(type_tag)
            .ok_or_else(|| ConnectorError::config(format!("unknown connector type '{type_tag}'")))?;
        parser(raw)
    }

    /// Parses a config record whose type is given by its `"type"` key.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the key is missing, the type is
    /// unknown, or the record does not parse.
    pub fn parse_entry(&self, raw: Value) -> ConnectorResult<Box<dyn ConnectorConfig>> {
        let type_tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::config("connector entry has no 'type'"))?
            .to_string();

        tracing::debug!(connector_type = %type_tag, "parsing connector config");
        self.parse(&type_tag, raw)
    }

    /// Parses a JSON array of connector entries.
    ///
    /// ## Errors
    ///
    /// Returns the first entry error, or a configuration error if the
    /// document is not an array.
    pub fn parse_all(&self, raw: Value) -> ConnectorResult<Vec<Box<dyn ConnectorConfig>>> {
        match raw {
            Value::Array(entries) => entries.into_iter().map(|e| self.parse_entry(e)).collect(),
            _ => Err(ConnectorError::config("connector list must be a JSON array")),
        }
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("types", &self.types())
            .finish()
    }
}
