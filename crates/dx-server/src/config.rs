//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::path::PathBuf;

use url::Url;

/// Path prefix connectors are mounted under.
pub const CONNECTOR_PREFIX: &str = "auth";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Base URL for the server (used in generated URLs).
    pub base_url: String,

    /// JSON file holding the connector list.
    pub connectors_file: PathBuf,

    /// Where browsers are sent when a login cannot proceed.
    pub error_url: String,

    /// Log level.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// ## Errors
    ///
    /// Returns an error if the base or error URL does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = std::env::var("DX_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("DX_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5556);

        let base_url = std::env::var("DX_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let connectors_file = std::env::var("DX_CONNECTORS_FILE")
            .map_or_else(|_| PathBuf::from("connectors.json"), PathBuf::from);

        let error_url = std::env::var("DX_ERROR_URL")
            .unwrap_or_else(|_| format!("{}/error", base_url.trim_end_matches('/')));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let config = Self {
            host,
            port,
            base_url,
            connectors_file,
            error_url,
            log_level,
        };
        config.base()?;
        config.error()?;
        Ok(config)
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing(connectors_file: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            base_url: "http://localhost:5556".to_string(),
            connectors_file: connectors_file.into(),
            error_url: "http://localhost:5556/error".to_string(),
            log_level: "debug".to_string(),
        }
    }

    /// Returns the parsed base URL.
    ///
    /// ## Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn base(&self) -> anyhow::Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base URL '{}': {e}", self.base_url))
    }

    /// Returns the parsed error URL.
    ///
    /// ## Errors
    ///
    /// Returns an error if `error_url` is not an absolute URL.
    pub fn error(&self) -> anyhow::Result<Url> {
        Url::parse(&self.error_url)
            .map_err(|e| anyhow::anyhow!("invalid error URL '{}': {e}", self.error_url))
    }

    /// Returns the namespace URL a connector is mounted under:
    /// `<base_url>/auth/<id>`.
    ///
    /// ## Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn namespace(&self, connector_id: &str) -> anyhow::Result<Url> {
        let mut url = self.base()?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("base URL '{}' cannot have a path", self.base_url))?
            .pop_if_empty()
            .push(CONNECTOR_PREFIX)
            .push(connector_id);
        Ok(url)
    }

    /// Returns the path of the landing page reached after a login.
    ///
    /// ## Errors
    ///
    /// Returns an error if the base URL does not parse.
    pub fn done_url(&self) -> anyhow::Result<Url> {
        let mut url = self.base()?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("base URL '{}' cannot have a path", self.base_url))?
            .pop_if_empty()
            .push("done");
        Ok(url)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5556,
            base_url: "http://localhost:5556".to_string(),
            connectors_file: PathBuf::from("connectors.json"),
            error_url: "http://localhost:5556/error".to_string(),
            log_level: "info".to_string(),
        }
    }
}
