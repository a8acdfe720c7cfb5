//! Router configuration.
//!
//! This module creates the main Axum router that combines all endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::CONNECTOR_PREFIX;
use crate::state::AppState;

/// Creates the main application router.
///
/// Every connector mounts its own login routes; `error_url` is where they
/// send the browser when a login cannot proceed.
pub fn create_router(state: AppState, error_url: Url) -> Router {
    let host_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/done", get(login_done))
        .route(
            &format!("/{CONNECTOR_PREFIX}/{{connector_id}}"),
            get(start_login),
        )
        .with_state(state.clone());

    let app = state
        .connectors
        .iter()
        .fold(host_routes, |app, connector| {
            std::sync::Arc::clone(connector).register_routes(app, error_url.clone())
        });

    app.layer(TraceLayer::new_for_http())
}

/// Server information response.
#[derive(Serialize)]
pub struct ServerInfo {
    name: String,
    version: String,
    connectors: Vec<String>,
}

/// Root endpoint handler.
async fn root(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: "dx".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connectors: state.connectors.iter().map(|c| c.id().to_string()).collect(),
    })
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every connector is.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Per-connector results.
    pub connectors: Vec<ConnectorHealth>,
}

/// Health of one connector.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectorHealth {
    /// Connector id.
    pub id: String,
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks every connector's upstream.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut connectors = Vec::with_capacity(state.connectors.len());
    for connector in state.connectors.iter() {
        let result = connector.healthy().await;
        match &result {
            Err(e) if e.is_unavailable() => {
                tracing::warn!(connector_id = %connector.id(), error = %e, "Connector upstream unreachable");
            }
            Err(e) => {
                tracing::error!(connector_id = %connector.id(), error = %e, "Connector health check failed");
            }
            Ok(()) => {}
        }
        connectors.push(ConnectorHealth {
            id: connector.id().to_string(),
            status: if result.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
            error: result.err().map(|e| e.to_string()),
        });
    }

    let healthy = connectors.iter().all(|c| c.error.is_none());
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connectors,
        }),
    )
}

/// Kubernetes liveness check.
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Query parameters for starting a login.
#[derive(Debug, Deserialize)]
pub struct StartLoginQuery {
    /// Broker session key.
    pub session_key: String,
    /// Prompt hint.
    #[serde(default)]
    pub prompt: String,
}

/// Redirects to a connector's login page.
async fn start_login(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<StartLoginQuery>,
) -> Response {
    let Some(connector) = state.connector(&connector_id) else {
        return (StatusCode::NOT_FOUND, "Unknown connector").into_response();
    };

    match connector.login_url(&query.session_key, &query.prompt) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::error!(connector_id = %connector_id, error = %e, "Login URL error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Login URL error").into_response()
        }
    }
}

/// Landing page query.
#[derive(Debug, Deserialize)]
pub struct DoneQuery {
    /// Session that completed its login.
    #[serde(default)]
    pub session_key: String,
}

/// Landing page response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DoneResponse {
    /// Always `logged_in`.
    pub status: String,
    /// Session that completed its login.
    pub session_key: String,
}

/// Landing page reached after a successful login.
async fn login_done(Query(query): Query<DoneQuery>) -> Json<DoneResponse> {
    Json(DoneResponse {
        status: "logged_in".to_string(),
        session_key: query.session_key,
    })
}
