//! Login page and form handlers.
//!
//! ## Security
//!
//! A failed login re-renders the form with one fixed message for both an
//! unknown user and a wrong password. Directory and callback failures send
//! the browser to the host error URL without detail.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use dx_connector::{ConnectorError, ConnectorResult, LoginPage, LoginPageContext, TemplateSet};
use serde::Deserialize;
use url::Url;

use crate::connection::ConnectionFactory;
use crate::connector::LdapConnector;

/// Name under which the login page is looked up in the template set.
pub const LOGIN_PAGE_TEMPLATE: &str = "ldap-login.html";

/// Message shown for any rejected login.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

// ============================================================================
// Page
// ============================================================================

#[derive(Template)]
#[template(path = "ldap-login.html")]
struct LdapLoginTemplate<'a> {
    post_url: &'a str,
    session_key: &'a str,
    prompt: &'a str,
    username: &'a str,
    error: Option<&'a str>,
    message: Option<&'a str>,
}

/// Built-in username/password form.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapLoginPage;

impl LoginPage for LdapLoginPage {
    fn render(&self, ctx: &LoginPageContext) -> ConnectorResult<String> {
        LdapLoginTemplate {
            post_url: &ctx.post_url,
            session_key: &ctx.session_key,
            prompt: &ctx.prompt,
            username: &ctx.username,
            error: ctx.error.as_deref(),
            message: ctx.message.as_deref(),
        }
        .render()
        .map_err(|e| ConnectorError::internal(format!("render {LOGIN_PAGE_TEMPLATE}: {e}")))
    }
}

/// Returns a template set holding the built-in login page.
#[must_use]
pub fn login_templates() -> TemplateSet {
    TemplateSet::new().with_page(LOGIN_PAGE_TEMPLATE, Arc::new(LdapLoginPage))
}

// ============================================================================
// Handlers
// ============================================================================

struct LoginState<F> {
    connector: Arc<LdapConnector<F>>,
    error_url: Arc<Url>,
}

impl<F> Clone for LoginState<F> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            error_url: Arc::clone(&self.error_url),
        }
    }
}

/// Query parameters of the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Broker session key.
    pub session_key: Option<String>,
    /// Prompt hint.
    #[serde(default)]
    pub prompt: String,
}

/// Submitted login form.
#[derive(Deserialize)]
pub struct LoginForm {
    /// Broker session key.
    #[serde(default)]
    pub session_key: String,
    /// Prompt hint echoed from the page.
    #[serde(default)]
    pub prompt: String,
    /// Username.
    #[serde(default)]
    pub userid: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Builds the router serving `GET` and `POST` on the connector's login path.
pub(crate) fn routes<F>(connector: Arc<LdapConnector<F>>, error_url: Url) -> Router
where
    F: ConnectionFactory + 'static,
{
    let path = connector.login_path().to_string();
    Router::new()
        .route(&path, get(show_login::<F>).post(submit_login::<F>))
        .with_state(LoginState {
            connector,
            error_url: Arc::new(error_url),
        })
}

async fn show_login<F>(
    State(state): State<LoginState<F>>,
    Query(query): Query<LoginQuery>,
) -> Response
where
    F: ConnectionFactory + 'static,
{
    let Some(session_key) = query.session_key.filter(|key| !key.is_empty()) else {
        tracing::debug!(connector_id = %state.connector.connector_id(), "Login page requested without session key");
        return redirect_to_error(&state.error_url, "invalid_request");
    };

    render_page(
        &state.connector,
        StatusCode::OK,
        LoginPageContext {
            post_url: state.connector.login_path().to_string(),
            session_key,
            prompt: query.prompt,
            ..LoginPageContext::default()
        },
    )
}

async fn submit_login<F>(
    State(state): State<LoginState<F>>,
    Form(form): Form<LoginForm>,
) -> Response
where
    F: ConnectionFactory + 'static,
{
    let connector = &state.connector;

    if form.session_key.is_empty() {
        return redirect_to_error(&state.error_url, "invalid_request");
    }

    let identity = match connector
        .authenticator()
        .authenticate(&form.userid, &form.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) if e.is_auth_error() => {
            tracing::info!(
                connector_id = %connector.connector_id(),
                username = %form.userid,
                "LDAP login rejected"
            );
            return render_page(
                connector,
                StatusCode::UNAUTHORIZED,
                LoginPageContext {
                    post_url: connector.login_path().to_string(),
                    session_key: form.session_key,
                    prompt: form.prompt,
                    username: form.userid,
                    error: Some(INVALID_CREDENTIALS_MESSAGE.to_string()),
                    message: None,
                },
            );
        }
        Err(e) => {
            tracing::error!(
                connector_id = %connector.connector_id(),
                error = %e,
                "LDAP login failed"
            );
            return redirect_to_error(&state.error_url, "server_error");
        }
    };

    match connector.complete_login(identity, &form.session_key).await {
        Ok(next) => Redirect::to(&next).into_response(),
        Err(e) => {
            tracing::error!(
                connector_id = %connector.connector_id(),
                error = %e,
                "Login callback failed"
            );
            redirect_to_error(&state.error_url, "server_error")
        }
    }
}

fn render_page<F: ConnectionFactory>(
    connector: &LdapConnector<F>,
    status: StatusCode,
    ctx: LoginPageContext,
) -> Response {
    match connector.login_page().render(&ctx) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

fn redirect_to_error(error_url: &Url, code: &str) -> Response {
    let mut url = error_url.clone();
    url.query_pairs_mut().append_pair("error", code);
    Redirect::to(url.as_str()).into_response()
}
