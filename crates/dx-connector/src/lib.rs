//! # dx-connector
//!
//! Connector contract between the identity broker and the upstream systems
//! that verify user credentials on its behalf.
//!
//! ## Design
//!
//! - [`Connector`] - What the broker holds for each configured upstream
//! - [`ConnectorConfig`] - Parsed configuration that knows how to build its connector
//! - [`ConnectorRegistry`] - Constructor table keyed by connector type tag
//! - [`TemplateSet`] - Named login page renderers supplied by the host
//! - [`Identity`] - Normalized identity returned by a successful login

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connector;
pub mod error;
pub mod identity;
pub mod registry;
pub mod template;

pub use connector::{Connector, ConnectorConfig, LoginCallback, LoginFn};
pub use error::{ConnectorError, ConnectorResult};
pub use identity::{Claims, Identity};
pub use registry::{ConfigParser, ConnectorRegistry};
pub use template::{LoginPage, LoginPageContext, TemplateSet};
