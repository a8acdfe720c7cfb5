//! In-memory directory for connector tests.
//!
//! [`FakeDirectory`] implements [`ConnectionFactory`] with a bind table and
//! a set of entries, and counts every connection it opens and closes.
//! Filters are limited to a single equality assertion, `(attr=value)`;
//! anything else that parses is refused with [`FILTER_ERROR`], and a filter
//! that does not parse fails before reaching the directory.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dx_connector_ldap::error::result_code;
use dx_connector_ldap::{
    ConnectionFactory, DirectoryConnection, DirectoryEntry, LdapError, LdapResult, SearchRequest,
};

/// LDAP result code for a malformed filter.
pub const FILTER_ERROR: u32 = 87;

/// How the directory answers an anonymous bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousBind {
    /// Accepted.
    Allowed,
    /// Refused with `inappropriateAuthentication`; the connection is unusable afterwards.
    Rejected,
    /// The server drops the connection.
    Disconnects,
}

#[derive(Debug)]
struct Inner {
    binds: HashMap<String, String>,
    entries: Vec<DirectoryEntry>,
    anonymous: AnonymousBind,
    connect_limit: Option<usize>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    searches: Mutex<Vec<SearchRequest>>,
    binds_seen: Mutex<Vec<String>>,
}

/// Shared in-memory directory. Clones see the same counters.
#[derive(Debug, Clone)]
pub struct FakeDirectory {
    inner: Arc<Inner>,
}

/// Builder for [`FakeDirectory`].
#[derive(Debug)]
pub struct FakeDirectoryBuilder {
    binds: HashMap<String, String>,
    entries: Vec<DirectoryEntry>,
    anonymous: AnonymousBind,
    connect_limit: Option<usize>,
}

impl FakeDirectory {
    /// Starts a directory with no accounts that allows anonymous binds.
    #[must_use]
    pub fn builder() -> FakeDirectoryBuilder {
        FakeDirectoryBuilder {
            binds: HashMap::new(),
            entries: Vec::new(),
            anonymous: AnonymousBind::Allowed,
            connect_limit: None,
        }
    }

    /// Connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Connections closed so far.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Searches received so far.
    #[must_use]
    pub fn searches(&self) -> Vec<SearchRequest> {
        self.inner
            .searches
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// DNs of every bind attempted so far, anonymous binds as `""`.
    #[must_use]
    pub fn binds(&self) -> Vec<String> {
        self.inner
            .binds_seen
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }
}

impl FakeDirectoryBuilder {
    /// Adds a bindable DN.
    #[must_use]
    pub fn account(mut self, dn: &str, password: &str) -> Self {
        self.binds.insert(dn.to_string(), password.to_string());
        self
    }

    /// Adds a searchable entry.
    #[must_use]
    pub fn entry(mut self, entry: DirectoryEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Adds a searchable entry that can also bind with `password`.
    #[must_use]
    pub fn user(self, entry: DirectoryEntry, password: &str) -> Self {
        let dn = entry.dn.clone();
        self.entry(entry).account(&dn, password)
    }

    /// Sets the anonymous bind policy.
    #[must_use]
    pub const fn anonymous(mut self, policy: AnonymousBind) -> Self {
        self.anonymous = policy;
        self
    }

    /// Refuses every connection after the first `limit`.
    #[must_use]
    pub const fn connect_limit(mut self, limit: usize) -> Self {
        self.connect_limit = Some(limit);
        self
    }

    /// Refuses every connection.
    #[must_use]
    pub const fn unreachable(self) -> Self {
        self.connect_limit(0)
    }

    /// Finishes the directory.
    #[must_use]
    pub fn build(self) -> FakeDirectory {
        FakeDirectory {
            inner: Arc::new(Inner {
                binds: self.binds,
                entries: self.entries,
                anonymous: self.anonymous,
                connect_limit: self.connect_limit,
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                searches: Mutex::new(Vec::new()),
                binds_seen: Mutex::new(Vec::new()),
            }),
        }
    }
}

#[async_trait]
impl ConnectionFactory for FakeDirectory {
    type Connection = FakeConnection;

    async fn connect(&self) -> LdapResult<FakeConnection> {
        let inner = &self.inner;
        if inner
            .connect_limit
            .is_some_and(|limit| inner.opened.load(Ordering::SeqCst) >= limit)
        {
            return Err(LdapError::connection("connection refused"));
        }

        inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            inner: Arc::clone(inner),
            broken: false,
        })
    }
}

/// Connection to a [`FakeDirectory`].
#[derive(Debug)]
pub struct FakeConnection {
    inner: Arc<Inner>,
    broken: bool,
}

impl FakeConnection {
    fn ensure_usable(&self) -> LdapResult<()> {
        if self.broken {
            Err(LdapError::connection("connection closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DirectoryConnection for FakeConnection {
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()> {
        self.ensure_usable()?;
        if let Ok(mut seen) = self.inner.binds_seen.lock() {
            seen.push(dn.to_string());
        }

        if dn.is_empty() && password.is_empty() {
            return match self.inner.anonymous {
                AnonymousBind::Allowed => Ok(()),
                AnonymousBind::Rejected => {
                    self.broken = true;
                    Err(LdapError::rejected(
                        result_code::INAPPROPRIATE_AUTHENTICATION,
                        "anonymous bind disallowed",
                    ))
                }
                AnonymousBind::Disconnects => {
                    self.broken = true;
                    Err(LdapError::connection("connection reset by peer"))
                }
            };
        }

        match self.inner.binds.get(dn) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(LdapError::rejected(result_code::INVALID_CREDENTIALS, "")),
        }
    }

    async fn search(&mut self, request: &SearchRequest) -> LdapResult<Vec<DirectoryEntry>> {
        self.ensure_usable()?;
        if let Ok(mut searches) = self.inner.searches.lock() {
            searches.push(request.clone());
        }

        if !well_formed(&request.filter) {
            return Err(LdapError::InvalidFilter {
                filter: request.filter.clone(),
            });
        }
        let (attr, value) = parse_equality(&request.filter)
            .ok_or_else(|| LdapError::rejected(FILTER_ERROR, "bad search filter"))?;

        Ok(self
            .inner
            .entries
            .iter()
            .filter(|entry| under_base(&entry.dn, &request.base))
            .filter(|entry| {
                entry
                    .get_attrs(attr)
                    .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
            })
            .map(|entry| project(entry, &request.attributes))
            .collect())
    }

    async fn close(self) {
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Checks that a filter is a single parenthesized element, as the client
/// library's parser does before anything is sent.
fn well_formed(filter: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in filter.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = match depth.checked_sub(1) {
                    Some(d) => d,
                    None => return false,
                };
                if depth == 0 && i + 1 != filter.len() {
                    return false;
                }
            }
            _ if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0 && !filter.is_empty()
}

fn parse_equality(filter: &str) -> Option<(&str, &str)> {
    let body = filter.strip_prefix('(')?.strip_suffix(')')?;
    let (attr, value) = body.split_once('=')?;
    if attr.is_empty() || body.contains(['(', ')', '*']) {
        return None;
    }
    Some((attr, value))
}

fn under_base(dn: &str, base: &str) -> bool {
    base.is_empty() || dn.to_ascii_lowercase().ends_with(&base.to_ascii_lowercase())
}

fn project(entry: &DirectoryEntry, attributes: &[String]) -> DirectoryEntry {
    attributes.iter().fold(DirectoryEntry::new(entry.dn.clone()), |out, name| {
        match entry.get_attrs(name) {
            Some(values) => out.with_attr(name.clone(), values.iter().cloned()),
            None => out,
        }
    })
}
