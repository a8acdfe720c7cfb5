//! End-to-End Integration Tests
//!
//! These tests drive the LDAP connector against an in-memory directory,
//! both directly and through its HTTP routes.

mod authenticate;
