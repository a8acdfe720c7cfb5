//! Directory connections.
//!
//! A connection is opened per login attempt and released exactly once by
//! consuming it with [`DirectoryConnection::close`]. Nothing is pooled.
//!
//! ## Security
//!
//! - Certificate material is loaded when the factory is built, so a bad
//!   `caFile` or client key fails connector construction rather than the
//!   first login.
//! - `skipCertVerification` disables server certificate checks entirely.
//!   Only use it against test directories.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use openssl::error::ErrorStack;
use openssl::pkey::PKey;

use crate::config::{LdapConfig, SecurityMode, TlsSettings};
use crate::error::{result_code, LdapError, LdapResult};
use crate::search::{DirectoryEntry, SearchRequest};

// ============================================================================
// Seams
// ============================================================================

/// An open, exclusively owned directory connection.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Simple bind. An empty DN and password is an anonymous bind.
    ///
    /// ## Errors
    ///
    /// - [`LdapError::Rejected`] if the server answers with a non-success code
    /// - [`LdapError::Connection`] or [`LdapError::Timeout`] on transport failure
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()>;

    /// Runs a search and returns every entry found.
    ///
    /// ## Errors
    ///
    /// Same classes as [`bind`](Self::bind).
    async fn search(&mut self, request: &SearchRequest) -> LdapResult<Vec<DirectoryEntry>>;

    /// Releases the connection.
    async fn close(self);
}

/// Opens fresh directory connections.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Connection type produced.
    type Connection: DirectoryConnection + 'static;

    /// Dials the directory and completes the TLS handshake if configured.
    ///
    /// ## Errors
    ///
    /// Returns a connection or timeout error if the directory is unreachable.
    async fn connect(&self) -> LdapResult<Self::Connection>;
}

// ============================================================================
// ldap3 Implementation
// ============================================================================

/// Connection factory backed by `ldap3`.
#[derive(Clone)]
pub struct LdapConnectionFactory {
    url: String,
    security: SecurityMode,
    timeout: Duration,
    tls: Option<TlsConnector>,
}

impl LdapConnectionFactory {
    /// Creates a factory for the configured directory.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if TLS is in use and the root bundle or
    /// the client certificate cannot be read or parsed.
    pub fn new(config: &LdapConfig) -> LdapResult<Self> {
        let tls = if config.security.uses_tls() {
            Some(build_tls_connector(&config.tls)?)
        } else {
            None
        };

        Ok(Self {
            url: config.url(),
            security: config.security,
            timeout: config.timeout,
            tls,
        })
    }

    fn settings(&self) -> LdapConnSettings {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.security == SecurityMode::Upgrade);
        match &self.tls {
            Some(connector) => settings.set_connector(connector.clone()),
            None => settings,
        }
    }
}

impl std::fmt::Debug for LdapConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnectionFactory")
            .field("url", &self.url)
            .field("security", &self.security)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionFactory for LdapConnectionFactory {
    type Connection = LdapConnection;

    async fn connect(&self) -> LdapResult<LdapConnection> {
        tracing::debug!(url = %self.url, security = ?self.security, "Dialing LDAP server");

        let (conn, ldap) = tokio::time::timeout(
            self.timeout,
            LdapConnAsync::with_settings(self.settings(), &self.url),
        )
        .await
        .map_err(|_| LdapError::Timeout)??;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!("LDAP connection driver error: {}", e);
            }
        });

        Ok(LdapConnection {
            ldap,
            timeout: self.timeout,
        })
    }
}

/// A live `ldap3` connection.
pub struct LdapConnection {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await?;
        check(result)
    }

    async fn search(&mut self, request: &SearchRequest) -> LdapResult<Vec<DirectoryEntry>> {
        let ldap3::SearchResult(entries, result) = self
            .ldap
            .with_timeout(self.timeout)
            .search(
                &request.base,
                request.scope.to_ldap3(),
                &request.filter,
                &request.attributes,
            )
            .await
            .map_err(|e| match e {
                ldap3::LdapError::FilterParsing => LdapError::InvalidFilter {
                    filter: request.filter.clone(),
                },
                other => other.into(),
            })?;
        check(result)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }

    async fn close(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            tracing::debug!("LDAP unbind failed: {}", e);
        }
    }
}

fn check(result: ldap3::LdapResult) -> LdapResult<()> {
    if result.rc == result_code::SUCCESS {
        Ok(())
    } else {
        Err(LdapError::rejected(result.rc, result.text))
    }
}

// ============================================================================
// TLS Material
// ============================================================================

fn build_tls_connector(tls: &TlsSettings) -> LdapResult<TlsConnector> {
    let mut builder = TlsConnector::builder();
    builder.danger_accept_invalid_certs(tls.skip_verification);

    if let Some(path) = &tls.ca_file {
        for cert in parse_root_bundle(&read_pem(path)?)
            .map_err(|e| LdapError::config(format!("{}: {e}", path.display())))?
        {
            builder.add_root_certificate(cert);
        }
    }

    if let (Some(cert), Some(key)) = (&tls.cert_file, &tls.key_file) {
        let key_pem = pkcs8_key(&read_pem(key)?).map_err(|e| {
            LdapError::config(format!("load client key failed: {}: {e}", key.display()))
        })?;
        let identity = native_tls::Identity::from_pkcs8(&read_pem(cert)?, &key_pem).map_err(|e| {
            LdapError::config(format!(
                "load client cert failed: cert={} key={}: {e}",
                cert.display(),
                key.display()
            ))
        })?;
        builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| LdapError::config(format!("unable to build TLS connector: {e}")))
}

fn read_pem(path: &Path) -> LdapResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| LdapError::config(format!("read {}: {e}", path.display())))
}

/// Re-encodes a PEM private key as PKCS#8.
///
/// Accepts PKCS#8 (`PRIVATE KEY`), PKCS#1 (`RSA PRIVATE KEY`) and SEC1
/// (`EC PRIVATE KEY`) blocks; the client identity loader only takes PKCS#8.
fn pkcs8_key(data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    PKey::private_key_from_pem(data)?.private_key_to_pem_pkcs8()
}

/// Parses every `CERTIFICATE` block of a PEM bundle.
fn parse_root_bundle(data: &[u8]) -> Result<Vec<Certificate>, String> {
    let blocks = pem::parse_many(data).map_err(|e| e.to_string())?;
    let certs = blocks
        .iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| Certificate::from_der(block.contents()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    if certs.is_empty() {
        return Err("unable to parse certificate data".to_string());
    }
    Ok(certs)
}
