//! HTTP handlers for bucket-level operations.
//!
//! Every JSON response is an `OperationOutcome`; failures go through `AppError`.

use crate::{
    errors::AppError,
    models::{
        bucket::{BucketCreationSpec, BucketInfo, VersioningState},
        object::{IncompleteUpload, ObjectMetadata, ObjectSummary, RemoveFailure},
        outcome::OperationOutcome,
    },
    services::storage_service::StorageService,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::io;

/// Body of `DELETE /buckets/{bucket}/objects`.
#[derive(Debug, Deserialize)]
pub struct RemoveObjectsReq {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedBucket {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct BucketExists {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedObjects {
    pub removed: usize,
    pub failures: Vec<RemoveFailure>,
}

#[derive(Debug, Serialize)]
pub struct Versioning {
    pub status: VersioningState,
}

/// GET `/buckets`
pub async fn list_buckets(
    State(service): State<StorageService>,
) -> Result<OperationOutcome<Vec<BucketInfo>>, AppError> {
    Ok(OperationOutcome::ok(service.list_buckets().await?))
}

/// POST `/buckets`
pub async fn create_bucket(
    State(service): State<StorageService>,
    Json(spec): Json<BucketCreationSpec>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = service.create_bucket(&spec).await?;
    Ok((
        StatusCode::CREATED,
        OperationOutcome::ok(CreatedBucket {
            name: bucket.name().to_string(),
        }),
    ))
}

/// GET `/buckets/{bucket}/exists`
pub async fn bucket_exists(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<BucketExists>, AppError> {
    let exists = service.bucket_exists(&bucket).await?;
    Ok(OperationOutcome::ok(BucketExists { exists }))
}

/// DELETE `/buckets/{bucket}`
pub async fn remove_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<()>, AppError> {
    service.remove_bucket(&bucket).await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/buckets/{bucket}/objects`: every key in listing order.
pub async fn list_objects(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<Vec<String>>, AppError> {
    let keys = service
        .list_objects(&bucket)?
        .map_ok(|summary| summary.key)
        .try_collect::<Vec<_>>()
        .await?;
    Ok(OperationOutcome::ok(keys))
}

/// DELETE `/buckets/{bucket}/objects`
pub async fn remove_objects(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
    Json(req): Json<RemoveObjectsReq>,
) -> Result<OperationOutcome<RemovedObjects>, AppError> {
    let failures = service.remove_objects(&bucket, &req.keys).await?;
    Ok(OperationOutcome::ok(RemovedObjects {
        removed: req.keys.len() - failures.len(),
        failures,
    }))
}

/// POST `/buckets/{bucket}/objects`: multipart form upload.
///
/// The first field carrying a filename is stored under that filename; other
/// fields are ignored.
pub async fn upload_form(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {err}")))?
    {
        let Some(key) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_owned);
        let body = field
            .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)))
            .boxed();

        let metadata: ObjectMetadata = service
            .put_object(&bucket, &key, body, None, content_type.as_deref())
            .await?;
        return Ok((StatusCode::CREATED, OperationOutcome::ok(metadata)));
    }

    Err(AppError::bad_request("multipart form has no file field"))
}

/// GET `/buckets/latest-object`
pub async fn latest_object(
    State(service): State<StorageService>,
) -> Result<OperationOutcome<Option<ObjectSummary>>, AppError> {
    Ok(OperationOutcome::ok(service.latest_object(None).await?))
}

/// GET `/buckets/{bucket}/latest-object`
pub async fn latest_object_in_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<Option<ObjectSummary>>, AppError> {
    Ok(OperationOutcome::ok(
        service.latest_object(Some(&bucket)).await?,
    ))
}

/// GET `/buckets/{bucket}/uploads`
pub async fn list_incomplete_uploads(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<Vec<IncompleteUpload>>, AppError> {
    Ok(OperationOutcome::ok(
        service.list_incomplete_uploads(&bucket).await?,
    ))
}

/// GET `/buckets/{bucket}/policy`: the raw policy document as a JSON string.
pub async fn get_bucket_policy(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<String>, AppError> {
    Ok(OperationOutcome::ok(service.get_bucket_policy(&bucket).await?))
}

/// PUT `/buckets/{bucket}/policy`: body is the policy document, verbatim.
pub async fn set_bucket_policy(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
    policy: String,
) -> Result<OperationOutcome<()>, AppError> {
    service.set_bucket_policy(&bucket, &policy).await?;
    Ok(OperationOutcome::ok(()))
}

/// GET `/buckets/{bucket}/versioning`
pub async fn get_versioning(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<OperationOutcome<Versioning>, AppError> {
    let status = service.get_versioning_state(&bucket).await?;
    Ok(OperationOutcome::ok(Versioning { status }))
}
