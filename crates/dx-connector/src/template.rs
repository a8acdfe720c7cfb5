//! Login page templates supplied by the host.
//!
//! Connectors that render their own credential form look their page up by
//! name when they are built, so a missing template is caught at startup
//! rather than on the first login.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConnectorResult;

/// Values available to a login page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginPageContext {
    /// Form action URL.
    pub post_url: String,
    /// Opaque broker session key, echoed back on submit.
    pub session_key: String,
    /// Prompt hint from the broker.
    pub prompt: String,
    /// Username to pre-fill after a failed attempt.
    pub username: String,
    /// Error message to display.
    pub error: Option<String>,
    /// Info message to display.
    pub message: Option<String>,
}

/// A renderable login page.
pub trait LoginPage: Send + Sync {
    /// Renders the page to HTML.
    ///
    /// ## Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&self, ctx: &LoginPageContext) -> ConnectorResult<String>;
}

/// Named set of login pages.
#[derive(Clone, Default)]
pub struct TemplateSet {
    pages: HashMap<String, Arc<dyn LoginPage>>,
}

impl TemplateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page under the given name, replacing any previous one.
    #[must_use]
    pub fn with_page(mut self, name: impl Into<String>, page: Arc<dyn LoginPage>) -> Self {
        self.pages.insert(name.into(), page);
        self
    }

    /// Merges another set into this one.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.pages.extend(other.pages);
        self
    }

    /// Looks up a page by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn LoginPage>> {
        self.pages.get(name).cloned()
    }
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.pages.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TemplateSet").field("pages", &names).finish()
    }
}
