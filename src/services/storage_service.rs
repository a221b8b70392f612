//! src/services/storage_service.rs
//!
//! StorageService, the gateway façade over an injected `ObjectStorage`.
//! Each method validates its inputs before making one backend call, or the
//! fixed sequence documented for composite actions. Nothing is cached or
//! retried here.

use crate::{
    models::{
        bucket::{BucketCreationSpec, BucketInfo, BucketRef, VersioningState},
        object::{
            DEFAULT_CONTENT_TYPE, IncompleteUpload, ObjectBody, ObjectDownload, ObjectMetadata,
            ObjectRef, ObjectRetention, ObjectSummary, RemoveFailure,
        },
        presigned::{PostPolicyForm, PresignedOperation, PresignedRequest, SizeRange},
    },
    services::{
        backend::{ObjectStorage, TagSet},
        error::{GatewayError, GatewayResult},
    },
};
use base64::{Engine as _, engine::general_purpose};
use bytes::BytesMut;
use chrono::Utc;
use futures::{StreamExt, stream::BoxStream};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle rule installed on every bucket created through the gateway.
pub const EPHEMERAL_RULE_ID: &str = "expire-ephemeral-objects";
/// Objects in gateway-created buckets expire after this many days.
pub const EPHEMERAL_EXPIRATION_DAYS: i32 = 1;

/// Placeholder file path used in the rendered curl example.
pub const DEFAULT_CURL_FILE: &str = "/path/to/file";

const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

/// Cheap to clone; every clone shares the same backend handle.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn ObjectStorage>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn ObjectStorage>) -> Self {
        Self { backend }
    }

    // === Buckets ===

    pub async fn list_buckets(&self) -> GatewayResult<Vec<BucketInfo>> {
        self.backend.list_buckets().await
    }

    /// Create a bucket and apply the requested configuration.
    ///
    /// Steps, each aborting the rest on failure:
    /// 1. existence check (`AlreadyExists` stops here, nothing is touched)
    /// 2. create, with object lock switched on if requested
    /// 3. enable versioning, if requested
    /// 4. default retention, if locking was requested
    /// 5. the ephemeral expiration rule
    ///
    /// A failure after step 2 leaves the partially configured bucket in place.
    pub async fn create_bucket(&self, spec: &BucketCreationSpec) -> GatewayResult<BucketRef> {
        let bucket = spec.validate()?;
        debug!("create_bucket {:?}", spec);

        if self.backend.bucket_exists(&bucket).await? {
            return Err(GatewayError::AlreadyExists(bucket.to_string()));
        }

        self.backend
            .create_bucket(&bucket, spec.object_locking)
            .await?;
        info!("created {}", bucket);

        if spec.versioning {
            self.backend.enable_versioning(&bucket).await?;
            debug!("enabled versioning on {}", bucket);
        }

        if let Some(retention) = spec.lock_retention() {
            self.backend.put_object_lock(&bucket, retention).await?;
            debug!(
                "configured {} retention of {} days on {}",
                retention.mode.as_str(),
                retention.days,
                bucket
            );
        }

        self.backend
            .put_expiration_rule(&bucket, EPHEMERAL_RULE_ID, EPHEMERAL_EXPIRATION_DAYS)
            .await?;

        Ok(bucket)
    }

    pub async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        self.backend.bucket_exists(&BucketRef::new(bucket)?).await
    }

    pub async fn remove_bucket(&self, bucket: &str) -> GatewayResult<()> {
        let bucket = BucketRef::new(bucket)?;
        self.backend.remove_bucket(&bucket).await?;
        info!("removed {}", bucket);
        Ok(())
    }

    /// Lazily list a bucket. Each call re-lists from the beginning.
    pub fn list_objects(
        &self,
        bucket: &str,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<ObjectSummary>>> {
        Ok(self.backend.list_objects(&BucketRef::new(bucket)?))
    }

    /// Most recently modified object in `bucket`, or across every bucket.
    ///
    /// Buckets are scanned in listing order and objects in the store's
    /// listing order; on equal timestamps the first one encountered wins.
    pub async fn latest_object(&self, bucket: Option<&str>) -> GatewayResult<Option<ObjectSummary>> {
        let buckets = match bucket {
            Some(name) => vec![BucketRef::new(name)?],
            None => self
                .backend
                .list_buckets()
                .await?
                .into_iter()
                .map(|info| BucketRef::from_store(info.name))
                .collect(),
        };

        let mut latest = None;
        for bucket in &buckets {
            let mut objects = self.backend.list_objects(bucket);
            while let Some(object) = objects.next().await {
                latest = keep_latest(latest, object?);
            }
        }
        Ok(latest)
    }

    pub async fn list_incomplete_uploads(
        &self,
        bucket: &str,
    ) -> GatewayResult<Vec<IncompleteUpload>> {
        self.backend
            .list_incomplete_uploads(&BucketRef::new(bucket)?)
            .await
    }

    pub async fn get_bucket_policy(&self, bucket: &str) -> GatewayResult<String> {
        self.backend.get_bucket_policy(&BucketRef::new(bucket)?).await
    }

    /// The policy document is passed through untouched.
    pub async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> GatewayResult<()> {
        let bucket = BucketRef::new(bucket)?;
        if policy.trim().is_empty() {
            return Err(GatewayError::validation("policy document must not be empty"));
        }
        self.backend.set_bucket_policy(&bucket, policy).await?;
        info!("updated policy on {}", bucket);
        Ok(())
    }

    pub async fn get_versioning_state(&self, bucket: &str) -> GatewayResult<VersioningState> {
        self.backend.get_versioning(&BucketRef::new(bucket)?).await
    }

    // === Objects ===

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody<'_>,
        size: Option<u64>,
        content_type: Option<&str>,
    ) -> GatewayResult<ObjectMetadata> {
        let object = ObjectRef::parse(bucket, key)?;
        let content_type = content_type
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let metadata = self
            .backend
            .put_object(&object, body, size, content_type)
            .await?;
        info!("uploaded {} ({} bytes)", object, metadata.size);
        Ok(metadata)
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> GatewayResult<ObjectDownload> {
        let object = ObjectRef::parse(bucket, key)?;
        debug!("get_object {}", object);
        self.backend.get_object(&object).await
    }

    /// Same bytes as [`get_object`](Self::get_object), base64-encoded for
    /// transports that cannot carry binary bodies.
    pub async fn get_object_base64(&self, bucket: &str, key: &str) -> GatewayResult<String> {
        let mut download = self.get_object(bucket, key).await?;
        let mut buffer = BytesMut::with_capacity(download.metadata.size as usize);
        while let Some(chunk) = download.body.next().await {
            let chunk = chunk.map_err(|err| GatewayError::Download(err.to_string()))?;
            buffer.extend_from_slice(&chunk);
        }
        Ok(general_purpose::STANDARD.encode(&buffer))
    }

    /// Copying onto the same object name is refused before the store is contacted.
    pub async fn copy_object(
        &self,
        source: (&str, &str),
        target: (&str, &str),
    ) -> GatewayResult<()> {
        let source = ObjectRef::parse(source.0, source.1)?;
        let target = ObjectRef::parse(target.0, target.1)?;
        if source.key() == target.key() {
            return Err(GatewayError::InvalidArgument(format!(
                "source and target object names are identical: `{}`",
                source.key()
            )));
        }
        self.backend.copy_object(&source, &target).await?;
        info!("copied {} to {}", source, target);
        Ok(())
    }

    pub async fn stat_object(&self, bucket: &str, key: &str) -> GatewayResult<ObjectMetadata> {
        self.backend
            .stat_object(&ObjectRef::parse(bucket, key)?)
            .await
    }

    pub async fn remove_object(&self, bucket: &str, key: &str) -> GatewayResult<()> {
        let object = ObjectRef::parse(bucket, key)?;
        self.backend.remove_object(&object).await?;
        info!("removed {}", object);
        Ok(())
    }

    /// Best-effort batch removal; keys the store refused are returned.
    pub async fn remove_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> GatewayResult<Vec<RemoveFailure>> {
        let bucket = BucketRef::new(bucket)?;
        if keys.is_empty() {
            return Err(GatewayError::validation("no keys given"));
        }
        for key in keys {
            ObjectRef::new(bucket.clone(), key.as_str())?;
        }
        let failures = self.backend.remove_objects(&bucket, keys).await?;
        info!(
            "removed {} of {} objects from {}",
            keys.len() - failures.len(),
            keys.len(),
            bucket
        );
        Ok(failures)
    }

    pub async fn set_legal_hold(&self, bucket: &str, key: &str, enabled: bool) -> GatewayResult<()> {
        let object = ObjectRef::parse(bucket, key)?;
        self.backend.set_legal_hold(&object, enabled).await?;
        info!("legal hold {} on {}", if enabled { "set" } else { "cleared" }, object);
        Ok(())
    }

    pub async fn get_legal_hold(&self, bucket: &str, key: &str) -> GatewayResult<bool> {
        self.backend
            .get_legal_hold(&ObjectRef::parse(bucket, key)?)
            .await
    }

    pub async fn set_object_retention(
        &self,
        bucket: &str,
        key: &str,
        retention: ObjectRetention,
    ) -> GatewayResult<()> {
        let object = ObjectRef::parse(bucket, key)?;
        if retention.retain_until <= Utc::now() {
            return Err(GatewayError::validation("retain_until must be in the future"));
        }
        self.backend
            .set_object_retention(&object, &retention)
            .await?;
        info!(
            "retention {} until {} on {}",
            retention.mode.as_str(),
            retention.retain_until,
            object
        );
        Ok(())
    }

    pub async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
    ) -> GatewayResult<ObjectRetention> {
        self.backend
            .get_object_retention(&ObjectRef::parse(bucket, key)?)
            .await
    }

    pub async fn set_object_tags(&self, bucket: &str, key: &str, tags: &TagSet) -> GatewayResult<()> {
        let object = ObjectRef::parse(bucket, key)?;
        validate_tags(tags)?;
        self.backend.set_object_tags(&object, tags).await
    }

    pub async fn get_object_tags(&self, bucket: &str, key: &str) -> GatewayResult<TagSet> {
        self.backend
            .get_object_tags(&ObjectRef::parse(bucket, key)?)
            .await
    }

    pub async fn remove_object_tags(&self, bucket: &str, key: &str) -> GatewayResult<()> {
        self.backend
            .remove_object_tags(&ObjectRef::parse(bucket, key)?)
            .await
    }

    // === Presigning ===

    pub async fn presigned_get(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u64>,
    ) -> GatewayResult<String> {
        let request = PresignedRequest::new(
            ObjectRef::parse(bucket, key)?,
            PresignedOperation::Get,
            expiry_secs,
        )?;
        Ok(self.backend.presign(&request).await?.url)
    }

    pub async fn presigned_put(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u64>,
    ) -> GatewayResult<String> {
        let request = PresignedRequest::new(
            ObjectRef::parse(bucket, key)?,
            PresignedOperation::Put,
            expiry_secs,
        )?;
        Ok(self.backend.presign(&request).await?.url)
    }

    /// Sign a browser-form upload policy and render an example curl invocation.
    pub async fn presigned_post(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u64>,
        size_range: SizeRange,
        file: Option<&str>,
    ) -> GatewayResult<PostPolicyForm> {
        let request = PresignedRequest::new(
            ObjectRef::parse(bucket, key)?,
            PresignedOperation::Post { size_range },
            expiry_secs,
        )?;
        let target = self.backend.presign(&request).await?;
        let curl = render_curl(&target.url, &target.fields, file.unwrap_or(DEFAULT_CURL_FILE));
        Ok(PostPolicyForm {
            url: target.url,
            fields: target.fields,
            curl,
        })
    }
}

/// Replace `current` only when `candidate` is strictly newer.
fn keep_latest(current: Option<ObjectSummary>, candidate: ObjectSummary) -> Option<ObjectSummary> {
    match current {
        Some(current) if candidate.last_modified <= current.last_modified => Some(current),
        _ => Some(candidate),
    }
}

fn validate_tags(tags: &TagSet) -> GatewayResult<()> {
    if tags.len() > MAX_TAGS {
        return Err(GatewayError::validation(format!(
            "at most {MAX_TAGS} tags are allowed, got {}",
            tags.len()
        )));
    }
    for (key, value) in tags {
        if key.is_empty() || key.chars().count() > MAX_TAG_KEY_LEN {
            return Err(GatewayError::validation(format!(
                "tag key `{key}` must be 1-{MAX_TAG_KEY_LEN} characters"
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(GatewayError::validation(format!(
                "value of tag `{key}` exceeds {MAX_TAG_VALUE_LEN} characters"
            )));
        }
    }
    Ok(())
}

fn render_curl(
    url: &str,
    fields: &std::collections::BTreeMap<String, String>,
    file: &str,
) -> String {
    let mut command = String::from("curl");
    for (name, value) in fields {
        command.push_str(&format!(" -F '{name}={value}'"));
    }
    command.push_str(&format!(" -F 'file=@{file}' {url}"));
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::bucket::{DefaultRetention, RetentionMode},
        services::{memory_backend::MemoryStorage, signer::SigningCredentials},
    };
    use bytes::Bytes;
    use chrono::{DateTime, Duration, TimeZone};
    use futures::stream;

    fn memory() -> MemoryStorage {
        MemoryStorage::new(SigningCredentials {
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            access_key: "test".into(),
            secret_key: "secret".into(),
        })
    }

    fn service_with(store: &MemoryStorage) -> StorageService {
        StorageService::new(Arc::new(store.clone()))
    }

    fn spec(name: &str) -> BucketCreationSpec {
        BucketCreationSpec {
            name: name.into(),
            ..Default::default()
        }
    }

    fn body(data: &'static [u8]) -> ObjectBody<'static> {
        stream::iter(vec![Ok(Bytes::from_static(data))]).boxed()
    }

    fn summary(key: &str, at: Option<DateTime<Utc>>) -> ObjectSummary {
        ObjectSummary {
            bucket: "b".into(),
            key: key.into(),
            size: 0,
            last_modified: at,
            etag: None,
        }
    }

    #[test]
    fn keep_latest_prefers_first_on_ties() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut latest = None;
        for candidate in [
            summary("a", Some(t)),
            summary("b", Some(t + Duration::seconds(5))),
            summary("c", Some(t + Duration::seconds(5))),
            summary("d", None),
        ] {
            latest = keep_latest(latest, candidate);
        }
        assert_eq!(latest.unwrap().key, "b");
    }

    #[test]
    fn curl_lists_every_field_then_the_file() {
        let fields = std::collections::BTreeMap::from([
            ("key".to_string(), "k".to_string()),
            ("policy".to_string(), "cA==".to_string()),
        ]);
        assert_eq!(
            render_curl("http://host/bucket", &fields, "/tmp/f"),
            "curl -F 'key=k' -F 'policy=cA==' -F 'file=@/tmp/f' http://host/bucket"
        );
    }

    #[test]
    fn tag_limits_are_enforced() {
        let too_many: TagSet = (0..11).map(|i| (format!("k{i}"), "v".into())).collect();
        assert!(validate_tags(&too_many).is_err());
        let long_value = TagSet::from([("k".into(), "v".repeat(257))]);
        assert!(validate_tags(&long_value).is_err());
        let empty_key = TagSet::from([(String::new(), "v".into())]);
        assert!(validate_tags(&empty_key).is_err());
        assert!(validate_tags(&TagSet::from([("env".into(), "prod".into())])).is_ok());
    }

    #[tokio::test]
    async fn create_then_exists() {
        let store = memory();
        let service = service_with(&store);
        service.create_bucket(&spec("fresh-bucket")).await.unwrap();
        assert!(service.bucket_exists("fresh-bucket").await.unwrap());
        assert_eq!(
            store
                .expiration_rules(&BucketRef::new("fresh-bucket").unwrap())
                .await
                .unwrap()
                .get(EPHEMERAL_RULE_ID),
            Some(&EPHEMERAL_EXPIRATION_DAYS)
        );
    }

    #[tokio::test]
    async fn create_existing_bucket_changes_nothing() {
        let store = memory();
        let service = service_with(&store);
        service.create_bucket(&spec("taken")).await.unwrap();

        let again = BucketCreationSpec {
            versioning: true,
            object_locking: true,
            ..spec("taken")
        };
        let err = service.create_bucket(&again).await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyExists(_)));

        let bucket = BucketRef::new("taken").unwrap();
        assert_eq!(
            service.get_versioning_state("taken").await.unwrap(),
            VersioningState::Unversioned
        );
        assert_eq!(store.default_retention(&bucket).await.unwrap(), None);
    }

    #[tokio::test]
    async fn locking_applies_default_retention() {
        let store = memory();
        let service = service_with(&store);
        let locked = BucketCreationSpec {
            object_locking: true,
            versioning: true,
            ..spec("locked")
        };
        service.create_bucket(&locked).await.unwrap();
        assert_eq!(
            store
                .default_retention(&BucketRef::new("locked").unwrap())
                .await
                .unwrap(),
            Some(DefaultRetention {
                mode: RetentionMode::Compliance,
                days: 365
            })
        );
        assert_eq!(
            service.get_versioning_state("locked").await.unwrap(),
            VersioningState::Enabled
        );
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_the_store() {
        let service = service_with(&memory());
        let err = service.create_bucket(&spec("No")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn copy_onto_same_name_fails_without_store_access() {
        // Neither bucket exists, so any store call would yield NotFound instead.
        let service = service_with(&memory());
        let err = service
            .copy_object(("missing-a", "same.txt"), ("missing-b", "same.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn latest_object_in_empty_scope_is_none() {
        let service = service_with(&memory());
        assert_eq!(service.latest_object(None).await.unwrap(), None);
        service.create_bucket(&spec("empty")).await.unwrap();
        assert_eq!(service.latest_object(Some("empty")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn latest_object_spans_buckets() {
        let service = service_with(&memory());
        service.create_bucket(&spec("first")).await.unwrap();
        service.create_bucket(&spec("second")).await.unwrap();
        service
            .put_object("second", "old", body(b"1"), None, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service
            .put_object("first", "new", body(b"2"), None, None)
            .await
            .unwrap();

        let latest = service.latest_object(None).await.unwrap().unwrap();
        assert_eq!((latest.bucket.as_str(), latest.key.as_str()), ("first", "new"));

        let in_second = service.latest_object(Some("second")).await.unwrap().unwrap();
        assert_eq!(in_second.key, "old");
    }

    #[tokio::test]
    async fn base64_matches_raw_bytes() {
        let service = service_with(&memory());
        service.create_bucket(&spec("blobs")).await.unwrap();
        service
            .put_object("blobs", "bin", body(&[0, 159, 255, 10]), Some(4), Some("image/png"))
            .await
            .unwrap();

        let encoded = service.get_object_base64("blobs", "bin").await.unwrap();
        assert_eq!(
            general_purpose::STANDARD.decode(encoded).unwrap(),
            vec![0, 159, 255, 10]
        );
        let meta = service.stat_object("blobs", "bin").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn missing_content_type_defaults_to_octet_stream() {
        let service = service_with(&memory());
        service.create_bucket(&spec("blobs")).await.unwrap();
        let meta = service
            .put_object("blobs", "raw", body(b"x"), None, Some(""))
            .await
            .unwrap();
        assert_eq!(meta.content_type.as_deref(), Some(DEFAULT_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn retention_in_the_past_is_rejected() {
        let service = service_with(&memory());
        let retention = ObjectRetention {
            mode: RetentionMode::Governance,
            retain_until: Utc::now() - Duration::days(1),
        };
        let err = service
            .set_object_retention("bucket", "key", retention)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn presigned_post_renders_curl() {
        let service = service_with(&memory());
        let form = service
            .presigned_post("uploads", "a.txt", Some(60), SizeRange::default(), None)
            .await
            .unwrap();
        assert!(form.curl.starts_with("curl -F 'bucket=uploads'"));
        assert!(form.curl.ends_with(&format!("-F 'file=@{DEFAULT_CURL_FILE}' {}", form.url)));
        assert!(form.fields.contains_key("x-amz-signature"));
    }

    #[tokio::test]
    async fn empty_batch_removal_is_rejected() {
        let service = service_with(&memory());
        assert!(matches!(
            service.remove_objects("bucket", &[]).await,
            Err(GatewayError::Validation(_))
        ));
    }
}
