//! Bucket endpoints driven through the router.

mod common;

use axum::http::StatusCode;
use common::{create_bucket, delete, get, put_object, send, send_json, test_app};
use object_gateway::{
    models::bucket::BucketRef, services::storage_service::EPHEMERAL_RULE_ID,
};
use serde_json::json;

#[tokio::test]
async fn bucket_lifecycle_scenario() {
    let (app, _store) = test_app();

    let response = create_bucket(&app, "test-bucket").await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["data"]["name"], "test-bucket");

    let exists = get(&app, "/buckets/test-bucket/exists").await;
    assert_eq!(exists.status, StatusCode::OK);
    assert_eq!(exists.json()["data"]["exists"], true);

    let removed = delete(&app, "/buckets/test-bucket").await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.json()["success"], true);

    let exists = get(&app, "/buckets/test-bucket/exists").await;
    assert_eq!(exists.json()["data"]["exists"], false);

    let again = delete(&app, "/buckets/test-bucket").await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    let body = again.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn create_existing_bucket_conflicts_without_reconfiguring() {
    let (app, store) = test_app();
    create_bucket(&app, "taken-bucket").await;

    let response = send_json(
        &app,
        "POST",
        "/buckets",
        json!({ "name": "taken-bucket", "versioning": true, "object_locking": true }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"]["kind"], "already_exists");

    let versioning = get(&app, "/buckets/taken-bucket/versioning").await;
    assert_eq!(versioning.json()["data"]["status"], "unversioned");
    let bucket = BucketRef::new("taken-bucket").unwrap();
    assert_eq!(store.default_retention(&bucket).await.unwrap(), None);
}

#[tokio::test]
async fn created_buckets_get_expiration_rule() {
    let (app, store) = test_app();
    create_bucket(&app, "ephemeral").await;
    let rules = store
        .expiration_rules(&BucketRef::new("ephemeral").unwrap())
        .await
        .unwrap();
    assert_eq!(rules.get(EPHEMERAL_RULE_ID), Some(&1));
}

#[tokio::test]
async fn invalid_bucket_names_are_rejected() {
    let (app, _store) = test_app();
    for name in ["ab", "Upper-Case", "under_score"] {
        let response = create_bucket(&app, name).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{name}");
        assert_eq!(response.json()["error"]["kind"], "validation");
    }

    let response = send_json(
        &app,
        "POST",
        "/buckets",
        json!({ "name": "no-lock", "retention_days": 30 }),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_buckets_and_objects() {
    let (app, _store) = test_app();
    create_bucket(&app, "alpha").await;
    create_bucket(&app, "beta").await;
    put_object(&app, "alpha", "docs/readme.txt", "text/plain", b"hello").await;
    put_object(&app, "alpha", "a.bin", "application/octet-stream", b"\x00").await;

    let buckets = get(&app, "/buckets").await.json();
    let names: Vec<_> = buckets["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["alpha", "beta"]);

    let keys = get(&app, "/buckets/alpha/objects").await.json();
    assert_eq!(keys["data"], json!(["a.bin", "docs/readme.txt"]));

    let missing = get(&app, "/buckets/gamma/objects").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_empty_bucket_cannot_be_removed() {
    let (app, _store) = test_app();
    create_bucket(&app, "full-bucket").await;
    put_object(&app, "full-bucket", "k", "text/plain", b"v").await;

    let response = delete(&app, "/buckets/full-bucket").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"]["kind"], "not_empty");
}

#[tokio::test]
async fn latest_object_endpoints() {
    let (app, _store) = test_app();

    let none = get(&app, "/buckets/latest-object").await;
    assert_eq!(none.status, StatusCode::OK);
    assert_eq!(none.json()["success"], true);
    assert!(none.json()["data"].is_null());

    create_bucket(&app, "recent").await;
    let empty = get(&app, "/buckets/recent/latest-object").await.json();
    assert!(empty["data"].is_null());

    put_object(&app, "recent", "first", "text/plain", b"1").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    put_object(&app, "recent", "second", "text/plain", b"2").await;

    let latest = get(&app, "/buckets/recent/latest-object").await.json();
    assert_eq!(latest["data"]["key"], "second");
    assert_eq!(latest["data"]["bucket"], "recent");

    let across = get(&app, "/buckets/latest-object").await.json();
    assert_eq!(across["data"]["key"], "second");
}

#[tokio::test]
async fn batch_removal_reports_per_key() {
    let (app, _store) = test_app();
    create_bucket(&app, "batch").await;
    put_object(&app, "batch", "a", "text/plain", b"a").await;
    put_object(&app, "batch", "b", "text/plain", b"b").await;

    let response = send_json(
        &app,
        "DELETE",
        "/buckets/batch/objects",
        json!({ "keys": ["a", "b", "never-existed"] }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["data"]["removed"], 3);
    assert_eq!(body["data"]["failures"], json!([]));

    let keys = get(&app, "/buckets/batch/objects").await.json();
    assert_eq!(keys["data"], json!([]));

    let empty = send_json(&app, "DELETE", "/buckets/batch/objects", json!({ "keys": [] })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bucket_policy_round_trip() {
    let (app, _store) = test_app();
    create_bucket(&app, "policied").await;

    let missing = get(&app, "/buckets/policied/policy").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let policy = r#"{"Version":"2012-10-17","Statement":[]}"#;
    let response = send(
        &app,
        axum::http::Request::builder()
            .method("PUT")
            .uri("/buckets/policied/policy")
            .body(axum::body::Body::from(policy))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let fetched = get(&app, "/buckets/policied/policy").await.json();
    assert_eq!(fetched["data"], policy);
}

#[tokio::test]
async fn incomplete_uploads_are_listed() {
    let (app, _store) = test_app();
    create_bucket(&app, "uploads").await;
    let response = get(&app, "/buckets/uploads/uploads").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"], json!([]));
}

#[tokio::test]
async fn health_endpoints() {
    let (app, _store) = test_app();
    let live = get(&app, "/healthz").await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.json()["status"], "ok");

    let ready = get(&app, "/readyz").await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.json()["checks"]["backend"]["ok"], true);
}
