//! [`ObjectStorage`] over any S3-compatible endpoint, using `aws-sdk-s3`.
//!
//! Request signing, retries and connection pooling stay inside the SDK. This
//! adapter only converts between gateway records and SDK types and classifies
//! SDK failures into [`GatewayError`].

use crate::{
    models::{
        bucket::{BucketInfo, BucketRef, DefaultRetention, RetentionMode, VersioningState},
        object::{
            IncompleteUpload, ObjectBody, ObjectDownload, ObjectMetadata, ObjectRef,
            ObjectRetention, ObjectSummary, RemoveFailure,
        },
        presigned::{PresignedOperation, PresignedRequest, PresignedTarget},
    },
    services::{
        backend::{ObjectStorage, TagSet},
        error::{GatewayError, GatewayResult},
        signer::{self, SigningCredentials, uri_encode},
    },
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client, Config as S3Config,
    config::{BehaviorVersion, Credentials, Region},
    error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as AwsDateTime},
    types::{
        BucketLifecycleConfiguration, BucketLocationConstraint, BucketVersioningStatus,
        CreateBucketConfiguration, DefaultRetention as AwsDefaultRetention, Delete,
        ExpirationStatus, LifecycleExpiration, LifecycleRule, LifecycleRuleFilter,
        ObjectIdentifier, ObjectLockConfiguration, ObjectLockEnabled, ObjectLockLegalHold,
        ObjectLockLegalHoldStatus, ObjectLockRetention, ObjectLockRetentionMode, ObjectLockRule,
        Tag, Tagging, VersioningConfiguration,
    },
};
use chrono::{DateTime, Utc};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use std::{collections::BTreeMap, io, path::PathBuf};
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// S3 DeleteObjects accepts at most this many keys per request.
const MAX_DELETE_BATCH: usize = 1000;
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    credentials: SigningCredentials,
    spool_dir: PathBuf,
}

impl S3Storage {
    /// Build a path-style client for `credentials.endpoint`.
    ///
    /// Uploads are spooled under `spool_dir` so their exact length is known
    /// before the request is signed.
    pub fn new(credentials: SigningCredentials, spool_dir: impl Into<PathBuf>) -> Self {
        info!("Initializing S3 client for endpoint {}", credentials.endpoint);

        let sdk_credentials = Credentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            None,
            None,
            "object-gateway",
        );
        let config = S3Config::builder()
            .credentials_provider(sdk_credentials)
            .region(Region::new(credentials.region.clone()))
            .endpoint_url(credentials.endpoint.clone())
            .force_path_style(true)
            .behavior_version(BehaviorVersion::latest())
            .build();

        Self {
            client: Client::from_conf(config),
            credentials,
            spool_dir: spool_dir.into(),
        }
    }

    /// Copy the request body to a temporary file, returning its path and length.
    ///
    /// The file is deleted when the returned [`TempPath`] is dropped, which
    /// covers early returns and cancelled requests alike.
    async fn spool(
        &self,
        mut body: ObjectBody<'_>,
        expected: Option<u64>,
    ) -> GatewayResult<(TempPath, u64)> {
        let named = tempfile::Builder::new()
            .prefix(".spool-")
            .tempfile_in(&self.spool_dir)
            .map_err(upload_io)?;
        let (file, path) = named.into_parts();
        let mut file = File::from_std(file);

        let mut size: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(upload_io)?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(upload_io)?;
        }
        file.flush().await.map_err(upload_io)?;

        if let Some(expected) = expected {
            if expected != size {
                return Err(GatewayError::Upload(format!(
                    "declared {expected} bytes but received {size}"
                )));
            }
        }
        debug!("spooled {} bytes to {}", size, path.display());
        Ok((path, size))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_buckets(&self) -> GatewayResult<Vec<BucketInfo>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| classify(err, "bucket listing", GatewayError::Backend))?;

        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketInfo {
                name: bucket.name().unwrap_or_default().to_string(),
                created_at: bucket.creation_date().and_then(to_chrono),
            })
            .collect())
    }

    async fn bucket_exists(&self, bucket: &BucketRef) -> GatewayResult<bool> {
        match self.client.head_bucket().bucket(bucket.name()).send().await {
            Ok(_) => Ok(true),
            Err(err) => match classify(err, &bucket.to_string(), GatewayError::Backend) {
                GatewayError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self, bucket: &BucketRef, object_locking: bool) -> GatewayResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket.name())
            .object_lock_enabled_for_bucket(object_locking);
        if self.credentials.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(
                        self.credentials.region.as_str(),
                    ))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn enable_versioning(&self, bucket: &BucketRef) -> GatewayResult<()> {
        self.client
            .put_bucket_versioning()
            .bucket(bucket.name())
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn put_object_lock(
        &self,
        bucket: &BucketRef,
        retention: DefaultRetention,
    ) -> GatewayResult<()> {
        let default_retention = AwsDefaultRetention::builder()
            .mode(to_sdk_mode(retention.mode))
            .days(retention.days)
            .build();
        let config = ObjectLockConfiguration::builder()
            .object_lock_enabled(ObjectLockEnabled::Enabled)
            .rule(
                ObjectLockRule::builder()
                    .default_retention(default_retention)
                    .build(),
            )
            .build();

        self.client
            .put_object_lock_configuration()
            .bucket(bucket.name())
            .object_lock_configuration(config)
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn put_expiration_rule(
        &self,
        bucket: &BucketRef,
        rule_id: &str,
        days: i32,
    ) -> GatewayResult<()> {
        let rule = LifecycleRule::builder()
            .id(rule_id)
            .filter(LifecycleRuleFilter::builder().prefix("").build())
            .expiration(LifecycleExpiration::builder().days(days).build())
            .status(ExpirationStatus::Enabled)
            .build()
            .map_err(build_error)?;
        let lifecycle = BucketLifecycleConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(build_error)?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket.name())
            .lifecycle_configuration(lifecycle)
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &BucketRef) -> GatewayResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket.name())
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    fn list_objects(&self, bucket: &BucketRef) -> BoxStream<'static, GatewayResult<ObjectSummary>> {
        let name = bucket.name().to_string();
        let subject = bucket.to_string();
        let pages = self
            .client
            .list_objects_v2()
            .bucket(bucket.name())
            .into_paginator()
            .send();

        stream::unfold(pages, |mut pages| async move {
            pages.next().await.map(|page| (page, pages))
        })
        .flat_map(move |page| {
            let items = match page {
                Ok(output) => output
                    .contents()
                    .iter()
                    .map(|object| {
                        Ok(ObjectSummary {
                            bucket: name.clone(),
                            key: object.key().unwrap_or_default().to_string(),
                            size: object.size().unwrap_or(0).max(0) as u64,
                            last_modified: object.last_modified().and_then(to_chrono),
                            etag: object.e_tag().map(trim_etag),
                        })
                    })
                    .collect::<Vec<_>>(),
                Err(err) => vec![Err(classify(err, &subject, GatewayError::Backend))],
            };
            stream::iter(items)
        })
        .boxed()
    }

    async fn list_incomplete_uploads(
        &self,
        bucket: &BucketRef,
    ) -> GatewayResult<Vec<IncompleteUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_multipart_uploads()
                .bucket(bucket.name())
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;

            uploads.extend(output.uploads().iter().map(|upload| IncompleteUpload {
                key: upload.key().unwrap_or_default().to_string(),
                upload_id: upload.upload_id().unwrap_or_default().to_string(),
                initiated: upload.initiated().and_then(to_chrono),
            }));

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_string);
            upload_id_marker = output.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }

    async fn get_bucket_policy(&self, bucket: &BucketRef) -> GatewayResult<String> {
        let subject = format!("policy for {bucket}");
        let output = self
            .client
            .get_bucket_policy()
            .bucket(bucket.name())
            .send()
            .await
            .map_err(|err| classify(err, &subject, GatewayError::Backend))?;
        output
            .policy()
            .map(str::to_string)
            .ok_or(GatewayError::NotFound(subject))
    }

    async fn set_bucket_policy(&self, bucket: &BucketRef, policy: &str) -> GatewayResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket.name())
            .policy(policy)
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn get_versioning(&self, bucket: &BucketRef) -> GatewayResult<VersioningState> {
        let output = self
            .client
            .get_bucket_versioning()
            .bucket(bucket.name())
            .send()
            .await
            .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;
        Ok(match output.status() {
            Some(BucketVersioningStatus::Enabled) => VersioningState::Enabled,
            Some(BucketVersioningStatus::Suspended) => VersioningState::Suspended,
            _ => VersioningState::Unversioned,
        })
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: ObjectBody<'_>,
        size: Option<u64>,
        content_type: &str,
    ) -> GatewayResult<ObjectMetadata> {
        let (spooled, size) = self.spool(body, size).await?;
        let stream = ByteStream::from_path(&spooled)
            .await
            .map_err(|err| GatewayError::Upload(err.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(object.bucket().name())
            .key(object.key())
            .content_type(content_type)
            .content_length(size as i64)
            .body(stream)
            .send()
            .await
            .map_err(|err| match classify(err, &object.to_string(), GatewayError::Upload) {
                upload @ GatewayError::Upload(_) => upload,
                other => GatewayError::Upload(other.to_string()),
            })?;
        drop(spooled);

        Ok(ObjectMetadata {
            key: object.key().to_string(),
            size,
            last_modified: None,
            content_type: Some(content_type.to_string()),
            etag: output.e_tag().map(trim_etag),
        })
    }

    async fn get_object(&self, object: &ObjectRef) -> GatewayResult<ObjectDownload> {
        let output = self
            .client
            .get_object()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Download))?;

        let metadata = ObjectMetadata {
            key: object.key().to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified().and_then(to_chrono),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(trim_etag),
        };
        let body = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(ObjectDownload { metadata, body })
    }

    async fn stat_object(&self, object: &ObjectRef) -> GatewayResult<ObjectMetadata> {
        let output = self
            .client
            .head_object()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;

        Ok(ObjectMetadata {
            key: object.key().to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified().and_then(to_chrono),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(trim_etag),
        })
    }

    async fn copy_object(&self, source: &ObjectRef, target: &ObjectRef) -> GatewayResult<()> {
        let copy_source = format!(
            "{}/{}",
            source.bucket().name(),
            uri_encode(source.key(), false)
        );
        self.client
            .copy_object()
            .bucket(target.bucket().name())
            .key(target.key())
            .copy_source(copy_source)
            .send()
            .await
            .map_err(|err| classify(err, &source.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn remove_object(&self, object: &ObjectRef) -> GatewayResult<()> {
        self.client
            .delete_object()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn remove_objects(
        &self,
        bucket: &BucketRef,
        keys: &[String],
    ) -> GatewayResult<Vec<RemoveFailure>> {
        let mut failures = Vec::new();
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let identifiers = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build().map_err(build_error))
                .collect::<GatewayResult<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(build_error)?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket.name())
                .delete(delete)
                .send()
                .await
                .map_err(|err| classify(err, &bucket.to_string(), GatewayError::Backend))?;

            failures.extend(output.errors().iter().map(|error| RemoveFailure {
                key: error.key().unwrap_or_default().to_string(),
                message: error
                    .message()
                    .or(error.code())
                    .unwrap_or("delete refused")
                    .to_string(),
            }));
        }
        Ok(failures)
    }

    async fn set_legal_hold(&self, object: &ObjectRef, enabled: bool) -> GatewayResult<()> {
        let status = if enabled {
            ObjectLockLegalHoldStatus::On
        } else {
            ObjectLockLegalHoldStatus::Off
        };
        self.client
            .put_object_legal_hold()
            .bucket(object.bucket().name())
            .key(object.key())
            .legal_hold(ObjectLockLegalHold::builder().status(status).build())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn get_legal_hold(&self, object: &ObjectRef) -> GatewayResult<bool> {
        let output = self
            .client
            .get_object_legal_hold()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(matches!(
            output.legal_hold().and_then(|hold| hold.status()),
            Some(ObjectLockLegalHoldStatus::On)
        ))
    }

    async fn set_object_retention(
        &self,
        object: &ObjectRef,
        retention: &ObjectRetention,
    ) -> GatewayResult<()> {
        let sdk_retention = ObjectLockRetention::builder()
            .mode(to_sdk_mode(retention.mode))
            .retain_until_date(AwsDateTime::from_secs(retention.retain_until.timestamp()))
            .build();
        self.client
            .put_object_retention()
            .bucket(object.bucket().name())
            .key(object.key())
            .retention(sdk_retention)
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn get_object_retention(&self, object: &ObjectRef) -> GatewayResult<ObjectRetention> {
        let subject = format!("retention for {object}");
        let output = self
            .client
            .get_object_retention()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &subject, GatewayError::Backend))?;

        let retention = output
            .retention()
            .ok_or_else(|| GatewayError::NotFound(subject.clone()))?;
        let mode = match retention.mode() {
            Some(ObjectLockRetentionMode::Compliance) => RetentionMode::Compliance,
            Some(ObjectLockRetentionMode::Governance) => RetentionMode::Governance,
            other => {
                return Err(GatewayError::Backend(format!(
                    "unrecognized retention mode {other:?}"
                )));
            }
        };
        let retain_until = retention
            .retain_until_date()
            .and_then(to_chrono)
            .ok_or(GatewayError::NotFound(subject))?;

        Ok(ObjectRetention { mode, retain_until })
    }

    async fn set_object_tags(&self, object: &ObjectRef, tags: &TagSet) -> GatewayResult<()> {
        let tag_set = tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build().map_err(build_error))
            .collect::<GatewayResult<Vec<_>>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(build_error)?;

        self.client
            .put_object_tagging()
            .bucket(object.bucket().name())
            .key(object.key())
            .tagging(tagging)
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn get_object_tags(&self, object: &ObjectRef) -> GatewayResult<TagSet> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect::<BTreeMap<_, _>>())
    }

    async fn remove_object_tags(&self, object: &ObjectRef) -> GatewayResult<()> {
        self.client
            .delete_object_tagging()
            .bucket(object.bucket().name())
            .key(object.key())
            .send()
            .await
            .map_err(|err| classify(err, &object.to_string(), GatewayError::Backend))?;
        Ok(())
    }

    async fn presign(&self, request: &PresignedRequest) -> GatewayResult<PresignedTarget> {
        let object = &request.object;
        let subject = object.to_string();
        let url = match request.operation {
            PresignedOperation::Get => self
                .client
                .get_object()
                .bucket(object.bucket().name())
                .key(object.key())
                .presigned(presigning_config(request)?)
                .await
                .map_err(|err| classify(err, &subject, GatewayError::Backend))?
                .uri()
                .to_string(),
            PresignedOperation::Put => self
                .client
                .put_object()
                .bucket(object.bucket().name())
                .key(object.key())
                .presigned(presigning_config(request)?)
                .await
                .map_err(|err| classify(err, &subject, GatewayError::Backend))?
                .uri()
                .to_string(),
            PresignedOperation::Post { size_range } => {
                return Ok(signer::post_policy(
                    &self.credentials,
                    object,
                    request.expiry,
                    size_range,
                    Utc::now(),
                ));
            }
        };
        Ok(PresignedTarget {
            url,
            fields: BTreeMap::new(),
        })
    }
}

fn presigning_config(request: &PresignedRequest) -> GatewayResult<PresigningConfig> {
    PresigningConfig::expires_in(request.expiry)
        .map_err(|err| GatewayError::validation(err.to_string()))
}

fn to_sdk_mode(mode: RetentionMode) -> ObjectLockRetentionMode {
    match mode {
        RetentionMode::Governance => ObjectLockRetentionMode::Governance,
        RetentionMode::Compliance => ObjectLockRetentionMode::Compliance,
    }
}

fn to_chrono(value: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn upload_io(err: io::Error) -> GatewayError {
    GatewayError::Upload(err.to_string())
}

fn build_error(err: BuildError) -> GatewayError {
    GatewayError::Backend(err.to_string())
}

/// Map an SDK failure onto a gateway error kind.
///
/// `fallback` decides the kind for failures that carry no recognizable code,
/// so uploads and downloads surface as such.
fn classify<E>(err: SdkError<E>, subject: &str, fallback: fn(String) -> GatewayError) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(|service| service.code())
        .map(str::to_string);
    let status = err.raw_response().map(|response| response.status().as_u16());
    let message = DisplayErrorContext(&err).to_string();
    classify_code(code.as_deref(), status, subject, message, fallback)
}

fn classify_code(
    code: Option<&str>,
    status: Option<u16>,
    subject: &str,
    message: String,
    fallback: fn(String) -> GatewayError,
) -> GatewayError {
    let error = match (code, status) {
        (
            Some(
                "NoSuchBucket"
                | "NoSuchKey"
                | "NotFound"
                | "NoSuchUpload"
                | "NoSuchBucketPolicy"
                | "NoSuchTagSet"
                | "NoSuchObjectLockConfiguration"
                | "ObjectLockConfigurationNotFoundError",
            ),
            _,
        ) => GatewayError::NotFound(subject.to_string()),
        (Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou"), _) => {
            GatewayError::AlreadyExists(subject.to_string())
        }
        (Some("BucketNotEmpty"), _) => GatewayError::NotEmpty(subject.to_string()),
        (
            Some(
                "AccessDenied"
                | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch"
                | "ExpiredToken"
                | "InvalidToken",
            ),
            _,
        ) => GatewayError::Authorization(message),
        (
            Some(
                "InvalidArgument"
                | "InvalidRequest"
                | "InvalidBucketName"
                | "MalformedXML"
                | "MalformedPolicy",
            ),
            _,
        ) => GatewayError::InvalidArgument(message),
        (_, Some(404)) => GatewayError::NotFound(subject.to_string()),
        (_, Some(403)) => GatewayError::Authorization(message),
        _ => fallback(message),
    };
    warn!(
        code = code.unwrap_or("-"),
        status = status.unwrap_or(0),
        kind = error.kind(),
        "storage call failed for {}",
        subject
    );
    error
}
