//! Presigned URL endpoints driven through the router.

mod common;

use axum::http::StatusCode;
use base64::{Engine as _, engine::general_purpose};
use common::{get, test_app};

fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

#[tokio::test]
async fn presigned_get_defaults_to_seven_days() {
    let (app, _store) = test_app();
    let response = get(&app, "/presigned/get?bucket=shared&key=docs/report.pdf").await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    let url = body["data"]["url"].as_str().unwrap();
    assert!(url.starts_with("http://127.0.0.1:9000/shared/docs/report.pdf?"));
    assert_eq!(query_param(url, "X-Amz-Expires"), Some("604800"));
    assert_eq!(query_param(url, "X-Amz-Algorithm"), Some("AWS4-HMAC-SHA256"));
}

#[tokio::test]
async fn presigned_put_honours_expiry() {
    let (app, _store) = test_app();
    let response = get(&app, "/presigned/put?bucket=shared&key=upload.bin&expiry_secs=90").await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let url = body["data"]["url"].as_str().unwrap();
    assert_eq!(query_param(url, "X-Amz-Expires"), Some("90"));
}

#[tokio::test]
async fn expiry_outside_sigv4_window_is_rejected() {
    let (app, _store) = test_app();
    for expiry in ["0", "604801"] {
        let response = get(
            &app,
            &format!("/presigned/get?bucket=shared&key=a&expiry_secs={expiry}"),
        )
        .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "expiry {expiry}");
        assert_eq!(response.json()["error"]["kind"], "validation");
    }
}

#[tokio::test]
async fn presigned_post_returns_form_and_curl() {
    let (app, _store) = test_app();
    let response = get(
        &app,
        "/presigned/post?bucket=inbox&key=photo.jpg&min_size=10&max_size=2048&file=/tmp/photo.jpg",
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    let form = &body["data"];
    assert_eq!(form["url"], "http://127.0.0.1:9000/inbox");
    for field in [
        "bucket",
        "key",
        "policy",
        "x-amz-algorithm",
        "x-amz-credential",
        "x-amz-date",
        "x-amz-signature",
    ] {
        assert!(form["fields"].get(field).is_some(), "missing {field}");
    }
    assert_eq!(form["fields"]["key"], "photo.jpg");

    let policy = general_purpose::STANDARD
        .decode(form["fields"]["policy"].as_str().unwrap())
        .unwrap();
    let policy: serde_json::Value = serde_json::from_slice(&policy).unwrap();
    assert_eq!(
        policy["conditions"][2],
        serde_json::json!(["content-length-range", 10, 2048])
    );

    let curl = form["curl"].as_str().unwrap();
    assert!(curl.starts_with("curl -F 'bucket=inbox' -F 'key=photo.jpg'"));
    assert!(curl.ends_with("-F 'file=@/tmp/photo.jpg' http://127.0.0.1:9000/inbox"));
}

#[tokio::test]
async fn presigned_post_rejects_inverted_size_range() {
    let (app, _store) = test_app();
    let response = get(
        &app,
        "/presigned/post?bucket=inbox&key=photo.jpg&min_size=100&max_size=10",
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn presigned_requests_validate_names() {
    let (app, _store) = test_app();
    let response = get(&app, "/presigned/get?bucket=NO&key=a").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let missing_key = get(&app, "/presigned/get?bucket=shared").await;
    assert_eq!(missing_key.status, StatusCode::BAD_REQUEST);
}
