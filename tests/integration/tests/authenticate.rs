//! Authenticator tests against the in-memory directory.

use dx_connector_ldap::{LdapConnectorConfig, LdapError, SearchScope};
use dx_integration_tests::{AnonymousBind, FakeDirectory};

use crate::common::*;

/// Tests a direct bind with the default template.
#[tokio::test]
async fn test_direct_bind_success() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&direct_bind_config(), &dir);

    let identity = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap();

    assert_eq!(identity.id, ALICE_DN);
    assert!(identity.name.is_empty());
    assert!(identity.email.is_empty());
    assert!(identity.claims.is_empty());
    assert_eq!(dir.binds(), vec![ALICE_DN.to_string()]);
    assert!(dir.searches().is_empty());
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests a custom bind template.
#[tokio::test]
async fn test_direct_bind_custom_template() {
    let dir = FakeDirectory::builder()
        .account("cn=bob,ou=staff,dc=example,dc=com", "pw")
        .build();
    let config = LdapConnectorConfig {
        base_dn: "dc=example,dc=com".to_string(),
        bind_template: "cn=%u,ou=staff,%b".to_string(),
        ..direct_bind_config()
    };

    let identity = authenticator(&config, &dir)
        .authenticate("bob", "pw")
        .await
        .unwrap();
    assert_eq!(identity.id, "cn=bob,ou=staff,dc=example,dc=com");
}

/// Tests that a wrong password and an unknown user look the same.
#[tokio::test]
async fn test_rejections_are_indistinguishable() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&direct_bind_config(), &dir);

    let wrong_password = auth.authenticate("alice", "wrong").await.unwrap_err();
    let unknown_user = auth.authenticate("mallory", "wrong").await.unwrap_err();

    assert!(matches!(wrong_password, LdapError::AuthRejected));
    assert!(matches!(unknown_user, LdapError::AuthRejected));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert_eq!((dir.opened(), dir.closed()), (2, 2));
}

/// Tests that an empty password never reaches the directory.
#[tokio::test]
async fn test_empty_password_rejected_without_connecting() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&direct_bind_config(), &dir);

    let err = auth.authenticate("alice", "").await.unwrap_err();

    assert!(matches!(err, LdapError::AuthRejected));
    assert_eq!(dir.opened(), 0);
}

/// Tests that an unreachable directory is a connection error.
#[tokio::test]
async fn test_unreachable_directory() {
    let dir = FakeDirectory::builder().unreachable().build();
    let auth = authenticator(&direct_bind_config(), &dir);

    let err = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap_err();

    assert!(err.is_connection_error());
    assert!(!err.is_auth_error());
    assert_eq!((dir.opened(), dir.closed()), (0, 0));
}

/// Tests search-then-bind mapping name, email and claims.
#[tokio::test]
async fn test_search_then_bind_success() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&search_config(), &dir);

    let identity = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap();

    assert_eq!(identity.id, ALICE_DN);
    assert_eq!(identity.name, "Alice Liddell");
    assert_eq!(identity.email, "alice@example.com");
    assert_eq!(
        identity.claims.get("groups"),
        Some(&vec![
            "cn=admins,dc=example,dc=com".to_string(),
            "cn=staff,dc=example,dc=com".to_string(),
        ])
    );
    assert!(!identity.claims.contains_key("telephoneNumber"));

    assert_eq!(
        dir.binds(),
        vec![SERVICE_DN.to_string(), String::new(), ALICE_DN.to_string()]
    );
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests the search request the authenticator sends.
#[tokio::test]
async fn test_search_request_shape() {
    let dir = directory(AnonymousBind::Allowed);
    let config = LdapConnectorConfig {
        search_scope: "one".to_string(),
        search_filter: "(&(objectClass=person)(uid=%u))".to_string(),
        ..search_config()
    };

    // The fake only evaluates single equality filters.
    let err = authenticator(&config, &dir)
        .authenticate("alice", ALICE_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_rejection());

    let searches = dir.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].base, BASE_DN);
    assert_eq!(searches[0].scope, SearchScope::OneLevel);
    assert_eq!(searches[0].filter, "(&(objectClass=person)(uid=alice))");
    assert_eq!(searches[0].attributes, vec!["cn", "mail", "memberOf"]);
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests that no search match is NoMatch, not AuthRejected.
#[tokio::test]
async fn test_search_no_match() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&search_config(), &dir);

    let err = auth.authenticate("nobody", "whatever").await.unwrap_err();

    match &err {
        LdapError::NoMatch { filter, base } => {
            assert_eq!(filter, "(uid=nobody)");
            assert_eq!(base, BASE_DN);
        }
        other => panic!("expected NoMatch, got {other:?}"),
    }
    assert!(!matches!(err, LdapError::AuthRejected));
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests that a username which breaks the filter syntax is treated as unknown.
#[tokio::test]
async fn test_search_malformed_filter_is_no_match() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&search_config(), &dir);

    let err = auth.authenticate("a)(b", "whatever").await.unwrap_err();

    match &err {
        LdapError::NoMatch { filter, base } => {
            assert_eq!(filter, "(uid=a)(b)");
            assert_eq!(base, BASE_DN);
        }
        other => panic!("expected NoMatch, got {other:?}"),
    }
    assert!(err.is_auth_error());
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests that the first of several matches is used.
#[tokio::test]
async fn test_search_multiple_matches_uses_first() {
    let dir = FakeDirectory::builder()
        .user(alice(), ALICE_PASSWORD)
        .user(
            dx_connector_ldap::DirectoryEntry::new("uid=alice,ou=contractors,ou=people,dc=example,dc=com")
                .with_attr("uid", ["alice"])
                .with_attr("mail", ["alice@contractor.example"]),
            "other",
        )
        .account(SERVICE_DN, SERVICE_PASSWORD)
        .build();

    let identity = authenticator(&search_config(), &dir)
        .authenticate("alice", ALICE_PASSWORD)
        .await
        .unwrap();

    assert_eq!(identity.id, ALICE_DN);
    assert_eq!(identity.email, "alice@example.com");
}

/// Tests a wrong password after a successful search.
#[tokio::test]
async fn test_search_then_bind_wrong_password() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&search_config(), &dir);

    let err = auth.authenticate("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, LdapError::AuthRejected));
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests that a refused search bind is a service fault.
#[tokio::test]
async fn test_search_bind_rejected() {
    let dir = directory(AnonymousBind::Allowed);
    let config = LdapConnectorConfig {
        search_bind_pw: Some("not the password".to_string().into()),
        ..search_config()
    };

    let err = authenticator(&config, &dir)
        .authenticate("alice", ALICE_PASSWORD)
        .await
        .unwrap_err();

    assert!(err.is_rejection());
    assert!(!err.is_auth_error());
    assert!(dir.searches().is_empty());
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests reconnecting when the anonymous bind is refused.
#[tokio::test]
async fn test_reconnect_after_anonymous_rejection() {
    let dir = directory(AnonymousBind::Rejected);
    let auth = authenticator(&search_config(), &dir);

    let identity = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap();

    assert_eq!(identity.email, "alice@example.com");
    assert_eq!((dir.opened(), dir.closed()), (2, 2));
}

/// Tests reconnecting when the anonymous bind drops the connection.
#[tokio::test]
async fn test_reconnect_after_anonymous_disconnect() {
    let dir = directory(AnonymousBind::Disconnects);
    let auth = authenticator(&search_config(), &dir);

    let identity = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap();

    assert_eq!(identity.id, ALICE_DN);
    assert_eq!((dir.opened(), dir.closed()), (2, 2));
}

/// Tests a wrong password on the reconnected connection.
#[tokio::test]
async fn test_reconnect_then_wrong_password() {
    let dir = directory(AnonymousBind::Rejected);
    let auth = authenticator(&search_config(), &dir);

    let err = auth.authenticate("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, LdapError::AuthRejected));
    assert_eq!((dir.opened(), dir.closed()), (2, 2));
}

/// Tests that a failed reconnect still closes the first connection once.
#[tokio::test]
async fn test_failed_reconnect_closes_once() {
    let dir = FakeDirectory::builder()
        .user(alice(), ALICE_PASSWORD)
        .account(SERVICE_DN, SERVICE_PASSWORD)
        .anonymous(AnonymousBind::Rejected)
        .connect_limit(1)
        .build();
    let auth = authenticator(&search_config(), &dir);

    let err = auth.authenticate("alice", ALICE_PASSWORD).await.unwrap_err();

    assert!(err.is_connection_error());
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}

/// Tests concurrent logins sharing one authenticator.
#[tokio::test]
async fn test_concurrent_logins() {
    let dir = directory(AnonymousBind::Rejected);
    let auth = authenticator(&search_config(), &dir);

    let (ok, bad, missing) = tokio::join!(
        auth.authenticate("alice", ALICE_PASSWORD),
        auth.authenticate("alice", "wrong"),
        auth.authenticate("nobody", "pw"),
    );

    assert!(ok.is_ok());
    assert!(matches!(bad, Err(LdapError::AuthRejected)));
    assert!(matches!(missing, Err(LdapError::NoMatch { .. })));
    assert_eq!(dir.opened(), dir.closed());
    assert_eq!(dir.opened(), 5);
}

/// Tests the health check opens and closes without binding.
#[tokio::test]
async fn test_check_connection() {
    let dir = directory(AnonymousBind::Allowed);
    let auth = authenticator(&direct_bind_config(), &dir);

    auth.check_connection().await.unwrap();

    assert!(dir.binds().is_empty());
    assert_eq!((dir.opened(), dir.closed()), (1, 1));
}
