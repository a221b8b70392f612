//! Presigned URL issuance.
//!
//! - GET /presigned/get   -> time-limited download URL
//! - GET /presigned/put   -> time-limited upload URL
//! - GET /presigned/post  -> browser-form upload policy plus a curl example

use crate::{
    errors::AppError,
    models::{
        outcome::OperationOutcome,
        presigned::{PostPolicyForm, SizeRange},
    },
    services::storage_service::StorageService,
};
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub bucket: String,
    pub key: String,
    pub expiry_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PresignPostQuery {
    pub bucket: String,
    pub key: String,
    pub expiry_secs: Option<u64>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    /// Local path shown in the rendered curl command.
    pub file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PresignedUrl {
    pub url: String,
}

/// GET `/presigned/get`
pub async fn presigned_get(
    State(service): State<StorageService>,
    Query(q): Query<PresignQuery>,
) -> Result<OperationOutcome<PresignedUrl>, AppError> {
    let url = service
        .presigned_get(&q.bucket, &q.key, q.expiry_secs)
        .await?;
    Ok(OperationOutcome::ok(PresignedUrl { url }))
}

/// GET `/presigned/put`
pub async fn presigned_put(
    State(service): State<StorageService>,
    Query(q): Query<PresignQuery>,
) -> Result<OperationOutcome<PresignedUrl>, AppError> {
    let url = service
        .presigned_put(&q.bucket, &q.key, q.expiry_secs)
        .await?;
    Ok(OperationOutcome::ok(PresignedUrl { url }))
}

/// GET `/presigned/post`
pub async fn presigned_post(
    State(service): State<StorageService>,
    Query(q): Query<PresignPostQuery>,
) -> Result<OperationOutcome<PostPolicyForm>, AppError> {
    let size_range = SizeRange::new(q.min_size, q.max_size)?;
    let form = service
        .presigned_post(
            &q.bucket,
            &q.key,
            q.expiry_secs,
            size_range,
            q.file.as_deref(),
        )
        .await?;
    Ok(OperationOutcome::ok(form))
}
