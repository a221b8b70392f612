//! HTTP handlers for object operations.
//! Streams object bodies in both directions to avoid buffering in memory and
//! delegates storage concerns to `StorageService`.

use crate::{
    errors::AppError,
    models::{
        object::{DEFAULT_CONTENT_TYPE, ObjectMetadata, ObjectRef, ObjectRetention},
        outcome::OperationOutcome,
    },
    services::{backend::TagSet, storage_service::StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;

/// `?bucket=..&key=..` used by the `/objects/*` endpoints.
#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Body of `POST /objects/copy`.
#[derive(Debug, Deserialize)]
pub struct CopyObjectReq {
    pub source: ObjectLocation,
    pub target: ObjectLocation,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LegalHold {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct EncodedObject {
    pub key: String,
    pub content: String,
}

/// PUT `/buckets/{bucket}/objects/{*key}`: raw body upload.
pub async fn upload_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let size = match headers.get(header::CONTENT_LENGTH) {
        Some(value) => Some(
            value
                .to_str()
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| AppError::bad_request("invalid Content-Length header"))?,
        ),
        None => None,
    };

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)))
        .boxed();

    let metadata = service
        .put_object(&bucket, &key, stream, size, content_type.as_deref())
        .await?;

    let mut resp_headers = HeaderMap::new();
    if let Some(value) = quoted_etag(&metadata) {
        resp_headers.insert(header::ETAG, value);
    }
    Ok((
        StatusCode::CREATED,
        resp_headers,
        OperationOutcome::ok(metadata),
    ))
}

/// GET `/buckets/{bucket}/objects/{*key}`: streaming download.
pub async fn get_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let object = ObjectRef::parse(&bucket, &key)?;
    let download = service.get_object(&bucket, &key).await?;

    let body = Body::from_stream(download.body);
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &download.metadata);

    let disposition = format!(
        "attachment; filename=\"{}\"",
        object.file_name().replace(['"', '\\'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// HEAD `/buckets/{bucket}/objects/{*key}`: same headers as GET but no body.
pub async fn head_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let meta = service.stat_object(&bucket, &key).await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

/// DELETE `/buckets/{bucket}/objects/{*key}`
pub async fn delete_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<OperationOutcome<()>, AppError> {
    service.remove_object(&bucket, &key).await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/objects/stat`
pub async fn stat_object(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<ObjectMetadata>, AppError> {
    Ok(OperationOutcome::ok(
        service.stat_object(&q.bucket, &q.key).await?,
    ))
}

/// GET `/objects/base64`
pub async fn get_object_base64(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<EncodedObject>, AppError> {
    let content = service.get_object_base64(&q.bucket, &q.key).await?;
    Ok(OperationOutcome::ok(EncodedObject {
        key: q.key,
        content,
    }))
}

/// POST `/objects/copy`
pub async fn copy_object(
    State(service): State<StorageService>,
    Json(req): Json<CopyObjectReq>,
) -> Result<OperationOutcome<()>, AppError> {
    service
        .copy_object(
            (&req.source.bucket, &req.source.key),
            (&req.target.bucket, &req.target.key),
        )
        .await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/objects/legal-hold`
pub async fn get_legal_hold(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<LegalHold>, AppError> {
    let enabled = service.get_legal_hold(&q.bucket, &q.key).await?;
    Ok(OperationOutcome::ok(LegalHold { enabled }))
}

/// PUT `/objects/legal-hold`
pub async fn set_legal_hold(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
    Json(hold): Json<LegalHold>,
) -> Result<OperationOutcome<()>, AppError> {
    service
        .set_legal_hold(&q.bucket, &q.key, hold.enabled)
        .await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/objects/retention`
pub async fn get_retention(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<ObjectRetention>, AppError> {
    Ok(OperationOutcome::ok(
        service.get_object_retention(&q.bucket, &q.key).await?,
    ))
}

/// PUT `/objects/retention`
pub async fn set_retention(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
    Json(retention): Json<ObjectRetention>,
) -> Result<OperationOutcome<()>, AppError> {
    service
        .set_object_retention(&q.bucket, &q.key, retention)
        .await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/objects/tags`
pub async fn get_tags(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<TagSet>, AppError> {
    Ok(OperationOutcome::ok(
        service.get_object_tags(&q.bucket, &q.key).await?,
    ))
}

/// PUT `/objects/tags`: replaces the whole tag set.
pub async fn set_tags(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
    Json(tags): Json<TagSet>,
) -> Result<OperationOutcome<()>, AppError> {
    service.set_object_tags(&q.bucket, &q.key, &tags).await?;
    Ok(OperationOutcome::ok(()))
}

/// DELETE `/objects/tags`
pub async fn remove_tags(
    State(service): State<StorageService>,
    Query(q): Query<ObjectQuery>,
) -> Result<OperationOutcome<()>, AppError> {
    service.remove_object_tags(&q.bucket, &q.key).await?;
    Ok(OperationOutcome::ok(()))
}

fn quoted_etag(meta: &ObjectMetadata) -> Option<HeaderValue> {
    meta.etag
        .as_ref()
        .and_then(|etag| HeaderValue::from_str(&format!("\"{}\"", etag)).ok())
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMetadata) {
    let content_type = meta.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));

    if let Some(value) = quoted_etag(meta) {
        headers.insert(header::ETAG, value);
    }

    if let Some(last_modified) = meta.last_modified {
        let http_date = last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = HeaderValue::from_str(&http_date) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}
