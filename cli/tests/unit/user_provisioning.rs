//! Unit tests for monitoring user provisioning.
//!
//! The admin session must be closed on every path once it was opened.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use plugin_setup::application::ports::UserLookup;
use plugin_setup::application::services::user_provisioning::{
    UserProvisioning, provision_monitoring_user,
};
use plugin_setup::domain::ExistingUserPolicy;

use crate::helpers::{mongo_request, oracle_request, postgres_request};
use crate::mocks::{CollectingReporter, StubDatabase};

#[tokio::test]
async fn test_absent_user_is_created_then_session_closed() {
    let db = StubDatabase::absent();
    let result = provision_monitoring_user(&db, &oracle_request(), &CollectingReporter::default())
        .await
        .unwrap();

    assert_eq!(result, UserProvisioning::Created);
    assert_eq!(
        db.events(),
        vec![
            "open system",
            "lookup site24x7_plugin",
            "create site24x7_plugin",
            "close"
        ]
    );
}

#[tokio::test]
async fn test_open_failure_has_nothing_to_close() {
    let mut db = StubDatabase::absent();
    db.fail_open = true;

    let err = provision_monitoring_user(&db, &postgres_request(), &CollectingReporter::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("authentication failed"));
    assert_eq!(db.events(), vec!["open postgres"]);
}

#[tokio::test]
async fn test_lookup_failure_still_closes_session() {
    let mut db = StubDatabase::absent();
    db.fail_lookup = true;

    let result =
        provision_monitoring_user(&db, &mongo_request(), &CollectingReporter::default()).await;

    assert!(result.is_err());
    assert_eq!(db.events().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_create_failure_still_closes_session() {
    let mut db = StubDatabase::absent();
    db.fail_create = true;

    let err = provision_monitoring_user(&db, &mongo_request(), &CollectingReporter::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("insufficient privileges"));
    assert_eq!(db.events().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_existing_user_under_failure_policy_closes_and_fails() {
    let db = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: true,
    });

    let err = provision_monitoring_user(&db, &oracle_request(), &CollectingReporter::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("already exists"), "got: {err}");
    assert!(!db.events().iter().any(|e| e.starts_with("create")));
    assert_eq!(db.events().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_existing_user_without_role_is_not_reused() {
    let db = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: false,
    });

    let err = provision_monitoring_user(&db, &mongo_request(), &CollectingReporter::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("clusterMonitor"), "got: {err}");
}

#[tokio::test]
async fn test_existing_user_with_role_is_already_present() {
    let db = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: true,
    });
    let request = oracle_request().with_existing_user_policy(ExistingUserPolicy::IdempotentOk);

    let result = provision_monitoring_user(&db, &request, &CollectingReporter::default())
        .await
        .unwrap();

    assert_eq!(result, UserProvisioning::AlreadyPresent);
}
