//! Shared helpers for the router-level tests.
//!
//! Requests are driven in-process with `tower::ServiceExt::oneshot` against an
//! in-memory backend; no network I/O.

#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use object_gateway::{
    routes,
    services::{
        memory_backend::MemoryStorage, signer::SigningCredentials,
        storage_service::StorageService,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

pub fn credentials() -> SigningCredentials {
    SigningCredentials {
        endpoint: "http://127.0.0.1:9000".into(),
        region: "us-east-1".into(),
        access_key: "test-access-key".into(),
        secret_key: "test-secret-key".into(),
    }
}

/// Router over a fresh in-memory store, plus a handle on the store itself.
pub fn test_app() -> (Router, MemoryStorage) {
    let store = MemoryStorage::new(credentials());
    let service = StorageService::new(Arc::new(store.clone()));
    (routes::routes::routes().with_state(service), store)
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn create_bucket(app: &Router, name: &str) -> TestResponse {
    send_json(app, "POST", "/buckets", serde_json::json!({ "name": name })).await
}

pub async fn put_object(
    app: &Router,
    bucket: &str,
    key: &str,
    content_type: &str,
    data: &'static [u8],
) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("PUT")
            .uri(format!("/buckets/{bucket}/objects/{key}"))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, data.len())
            .body(Body::from(data))
            .unwrap(),
    )
    .await
}
