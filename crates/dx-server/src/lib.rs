//! # dx-server
//!
//! Development host for the broker's password connectors.
//!
//! This crate provides a small HTTP server that:
//! - Loads the connector list and builds each connector
//! - Mounts every connector's login routes under `<base_url>/auth/<id>`
//! - Serves health checks aggregating each connector's upstream
//! - Logs the identity of every completed login
//!
//! ## Usage
//!
//! ```ignore
//! use dx_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod connectors;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use connectors::{build_connectors, load_connectors, LoggingLoginCallback};
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dx_connector::{Connector, LoginFn};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// The development server.
pub struct Server {
    config: ServerConfig,
    connectors: Vec<Arc<dyn Connector>>,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// This loads the connector list and builds every connector, so bad
    /// configuration fails here rather than on the first request.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration or any connector is invalid.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        config.error()?;
        let login: LoginFn = Arc::new(LoggingLoginCallback::new(config.done_url()?));
        let connectors = load_connectors(&config, &config.connectors_file, &login)?;

        tracing::info!(
            connectors = connectors.len(),
            file = %config.connectors_file.display(),
            "Connectors loaded"
        );

        Ok(Self { config, connectors })
    }

    /// Creates a server around already built connectors.
    #[must_use]
    pub fn with_connectors(config: ServerConfig, connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { config, connectors }
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    ///
    /// ## Errors
    ///
    /// Returns an error if the listener cannot be bound or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router()?;

        // Hold the sync stop signals for the server's lifetime
        let stop_signals: Vec<oneshot::Sender<()>> =
            self.connectors.iter().map(|c| c.sync()).collect();

        // Bind to address
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on http://{}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        for stop in stop_signals {
            let _ = stop.send(());
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the built connectors.
    #[must_use]
    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    /// Creates the router without starting the server.
    ///
    /// This is useful for integration testing.
    ///
    /// ## Errors
    ///
    /// Returns an error if the error URL does not parse.
    pub fn router(&self) -> anyhow::Result<Router> {
        let state = AppState::new(self.config.clone(), self.connectors.clone());
        Ok(create_router(state, self.config.error()?))
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
