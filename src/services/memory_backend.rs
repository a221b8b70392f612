//! In-process [`ObjectStorage`] for local development and tests.
//!
//! Follows S3 semantics closely enough for the gateway's contract: missing
//! buckets and keys, non-empty bucket removal, object-lock prerequisites for
//! legal holds and retention, and delete protection while either is active.

use crate::{
    models::{
        bucket::{BucketInfo, BucketRef, DefaultRetention, VersioningState},
        object::{
            IncompleteUpload, ObjectBody, ObjectDownload, ObjectMetadata, ObjectRef,
            ObjectRetention, ObjectSummary, RemoveFailure,
        },
        presigned::{PresignedOperation, PresignedRequest, PresignedTarget},
    },
    services::{
        backend::{ObjectStorage, TagSet},
        error::{GatewayError, GatewayResult},
        signer::{self, SigningCredentials},
    },
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
    legal_hold: bool,
    retention: Option<ObjectRetention>,
    tags: TagSet,
}

impl StoredObject {
    fn metadata(&self, key: &str) -> ObjectMetadata {
        ObjectMetadata {
            key: key.to_string(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            content_type: Some(self.content_type.clone()),
            etag: Some(self.etag.clone()),
        }
    }

    fn is_protected(&self, now: DateTime<Utc>) -> bool {
        self.legal_hold
            || self
                .retention
                .is_some_and(|retention| retention.retain_until > now)
    }
}

#[derive(Clone, Debug)]
struct StoredBucket {
    created_at: DateTime<Utc>,
    versioning: VersioningState,
    object_lock_enabled: bool,
    default_retention: Option<DefaultRetention>,
    expiration_rules: BTreeMap<String, i32>,
    policy: Option<String>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Default, Debug)]
struct MemoryState {
    buckets: BTreeMap<String, StoredBucket>,
}

impl MemoryState {
    fn bucket(&self, bucket: &BucketRef) -> GatewayResult<&StoredBucket> {
        self.buckets
            .get(bucket.name())
            .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))
    }

    fn bucket_mut(&mut self, bucket: &BucketRef) -> GatewayResult<&mut StoredBucket> {
        self.buckets
            .get_mut(bucket.name())
            .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))
    }

    fn object(&self, object: &ObjectRef) -> GatewayResult<&StoredObject> {
        self.bucket(object.bucket())?
            .objects
            .get(object.key())
            .ok_or_else(|| GatewayError::NotFound(object.to_string()))
    }

    /// Object whose bucket has object lock enabled, as S3 requires for holds and retention.
    fn lockable_object_mut(&mut self, object: &ObjectRef) -> GatewayResult<&mut StoredObject> {
        let bucket = self.bucket_mut(object.bucket())?;
        if !bucket.object_lock_enabled {
            return Err(GatewayError::InvalidArgument(format!(
                "{} is missing an object lock configuration",
                object.bucket()
            )));
        }
        bucket
            .objects
            .get_mut(object.key())
            .ok_or_else(|| GatewayError::NotFound(object.to_string()))
    }
}

/// Thread-safe in-memory store. Cloning shares the same contents.
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    credentials: SigningCredentials,
}

impl MemoryStorage {
    pub fn new(credentials: SigningCredentials) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            credentials,
        }
    }

    /// Expiration rules installed on a bucket, keyed by rule id.
    pub async fn expiration_rules(&self, bucket: &BucketRef) -> GatewayResult<BTreeMap<String, i32>> {
        let state = self.state.read().await;
        Ok(state.bucket(bucket)?.expiration_rules.clone())
    }

    /// Default retention configured on a bucket, if any.
    pub async fn default_retention(
        &self,
        bucket: &BucketRef,
    ) -> GatewayResult<Option<DefaultRetention>> {
        let state = self.state.read().await;
        Ok(state.bucket(bucket)?.default_retention)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn list_buckets(&self) -> GatewayResult<Vec<BucketInfo>> {
        let state = self.state.read().await;
        Ok(state
            .buckets
            .iter()
            .map(|(name, bucket)| BucketInfo {
                name: name.clone(),
                created_at: Some(bucket.created_at),
            })
            .collect())
    }

    async fn bucket_exists(&self, bucket: &BucketRef) -> GatewayResult<bool> {
        Ok(self.state.read().await.buckets.contains_key(bucket.name()))
    }

    async fn create_bucket(&self, bucket: &BucketRef, object_locking: bool) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        if state.buckets.contains_key(bucket.name()) {
            return Err(GatewayError::AlreadyExists(bucket.to_string()));
        }
        state.buckets.insert(
            bucket.name().to_string(),
            StoredBucket {
                created_at: Utc::now(),
                // S3 turns versioning on implicitly for object-lock buckets.
                versioning: if object_locking {
                    VersioningState::Enabled
                } else {
                    VersioningState::Unversioned
                },
                object_lock_enabled: object_locking,
                default_retention: None,
                expiration_rules: BTreeMap::new(),
                policy: None,
                objects: BTreeMap::new(),
            },
        );
        debug!("memory: created {}", bucket);
        Ok(())
    }

    async fn enable_versioning(&self, bucket: &BucketRef) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state.bucket_mut(bucket)?.versioning = VersioningState::Enabled;
        Ok(())
    }

    async fn put_object_lock(
        &self,
        bucket: &BucketRef,
        retention: DefaultRetention,
    ) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let stored = state.bucket_mut(bucket)?;
        if !stored.object_lock_enabled {
            return Err(GatewayError::InvalidArgument(format!(
                "object lock was not enabled when {bucket} was created"
            )));
        }
        stored.default_retention = Some(retention);
        Ok(())
    }

    async fn put_expiration_rule(
        &self,
        bucket: &BucketRef,
        rule_id: &str,
        days: i32,
    ) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state
            .bucket_mut(bucket)?
            .expiration_rules
            .insert(rule_id.to_string(), days);
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &BucketRef) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        if !state.bucket(bucket)?.objects.is_empty() {
            return Err(GatewayError::NotEmpty(bucket.name().to_string()));
        }
        state.buckets.remove(bucket.name());
        Ok(())
    }

    fn list_objects(&self, bucket: &BucketRef) -> BoxStream<'static, GatewayResult<ObjectSummary>> {
        let state = Arc::clone(&self.state);
        let bucket = bucket.clone();
        stream::once(async move {
            let state = state.read().await;
            let items = match state.bucket(&bucket) {
                Ok(stored) => stored
                    .objects
                    .iter()
                    .map(|(key, object)| {
                        Ok(ObjectSummary {
                            bucket: bucket.name().to_string(),
                            key: key.clone(),
                            size: object.data.len() as u64,
                            last_modified: Some(object.last_modified),
                            etag: Some(object.etag.clone()),
                        })
                    })
                    .collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }

    async fn list_incomplete_uploads(
        &self,
        bucket: &BucketRef,
    ) -> GatewayResult<Vec<IncompleteUpload>> {
        // Uploads complete atomically here, so there is never anything pending.
        self.state.read().await.bucket(bucket)?;
        Ok(Vec::new())
    }

    async fn get_bucket_policy(&self, bucket: &BucketRef) -> GatewayResult<String> {
        let state = self.state.read().await;
        state
            .bucket(bucket)?
            .policy
            .clone()
            .ok_or_else(|| GatewayError::NotFound(format!("policy for {bucket}")))
    }

    async fn set_bucket_policy(&self, bucket: &BucketRef, policy: &str) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state.bucket_mut(bucket)?.policy = Some(policy.to_string());
        Ok(())
    }

    async fn get_versioning(&self, bucket: &BucketRef) -> GatewayResult<VersioningState> {
        Ok(self.state.read().await.bucket(bucket)?.versioning)
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        mut body: ObjectBody<'_>,
        size: Option<u64>,
        content_type: &str,
    ) -> GatewayResult<ObjectMetadata> {
        if !self.bucket_exists(object.bucket()).await? {
            return Err(GatewayError::Upload(format!("{} not found", object.bucket())));
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| GatewayError::Upload(err.to_string()))?;
            buffer.extend_from_slice(&chunk);
        }
        if let Some(expected) = size {
            if buffer.len() as u64 != expected {
                return Err(GatewayError::Upload(format!(
                    "declared {expected} bytes but received {}",
                    buffer.len()
                )));
            }
        }

        let data = buffer.freeze();
        let stored = StoredObject {
            etag: format!("{:x}", md5::compute(&data)),
            data,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
            legal_hold: false,
            retention: None,
            tags: TagSet::new(),
        };
        let metadata = stored.metadata(object.key());

        let mut state = self.state.write().await;
        state
            .bucket_mut(object.bucket())
            .map_err(|err| GatewayError::Upload(err.to_string()))?
            .objects
            .insert(object.key().to_string(), stored);
        Ok(metadata)
    }

    async fn get_object(&self, object: &ObjectRef) -> GatewayResult<ObjectDownload> {
        let state = self.state.read().await;
        let stored = state.object(object)?;
        let data = stored.data.clone();
        Ok(ObjectDownload {
            metadata: stored.metadata(object.key()),
            body: stream::once(async move { Ok(data) }).boxed(),
        })
    }

    async fn stat_object(&self, object: &ObjectRef) -> GatewayResult<ObjectMetadata> {
        let state = self.state.read().await;
        Ok(state.object(object)?.metadata(object.key()))
    }

    async fn copy_object(&self, source: &ObjectRef, target: &ObjectRef) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let mut copy = state.object(source)?.clone();
        copy.last_modified = Utc::now();
        copy.legal_hold = false;
        copy.retention = None;
        state
            .bucket_mut(target.bucket())?
            .objects
            .insert(target.key().to_string(), copy);
        Ok(())
    }

    async fn remove_object(&self, object: &ObjectRef) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let bucket = state.bucket_mut(object.bucket())?;
        if let Some(stored) = bucket.objects.get(object.key()) {
            if stored.is_protected(Utc::now()) {
                return Err(GatewayError::Authorization(format!(
                    "{object} is protected by object lock"
                )));
            }
        }
        bucket.objects.remove(object.key());
        Ok(())
    }

    async fn remove_objects(
        &self,
        bucket: &BucketRef,
        keys: &[String],
    ) -> GatewayResult<Vec<RemoveFailure>> {
        let mut state = self.state.write().await;
        let stored = state.bucket_mut(bucket)?;
        let now = Utc::now();
        let mut failures = Vec::new();
        for key in keys {
            match stored.objects.get(key) {
                Some(object) if object.is_protected(now) => failures.push(RemoveFailure {
                    key: key.clone(),
                    message: "object is protected by object lock".into(),
                }),
                _ => {
                    stored.objects.remove(key);
                }
            }
        }
        Ok(failures)
    }

    async fn set_legal_hold(&self, object: &ObjectRef, enabled: bool) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state.lockable_object_mut(object)?.legal_hold = enabled;
        Ok(())
    }

    async fn get_legal_hold(&self, object: &ObjectRef) -> GatewayResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.lockable_object_mut(object)?.legal_hold)
    }

    async fn set_object_retention(
        &self,
        object: &ObjectRef,
        retention: &ObjectRetention,
    ) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state.lockable_object_mut(object)?.retention = Some(*retention);
        Ok(())
    }

    async fn get_object_retention(&self, object: &ObjectRef) -> GatewayResult<ObjectRetention> {
        let mut state = self.state.write().await;
        state
            .lockable_object_mut(object)?
            .retention
            .ok_or_else(|| GatewayError::NotFound(format!("retention for {object}")))
    }

    async fn set_object_tags(&self, object: &ObjectRef, tags: &TagSet) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .bucket_mut(object.bucket())?
            .objects
            .get_mut(object.key())
            .ok_or_else(|| GatewayError::NotFound(object.to_string()))?;
        stored.tags = tags.clone();
        Ok(())
    }

    async fn get_object_tags(&self, object: &ObjectRef) -> GatewayResult<TagSet> {
        let state = self.state.read().await;
        Ok(state.object(object)?.tags.clone())
    }

    async fn remove_object_tags(&self, object: &ObjectRef) -> GatewayResult<()> {
        self.set_object_tags(object, &TagSet::new()).await
    }

    async fn presign(&self, request: &PresignedRequest) -> GatewayResult<PresignedTarget> {
        let now = Utc::now();
        let target = match request.operation {
            PresignedOperation::Get => PresignedTarget {
                url: signer::presign_url(&self.credentials, "GET", &request.object, request.expiry, now),
                fields: BTreeMap::new(),
            },
            PresignedOperation::Put => PresignedTarget {
                url: signer::presign_url(&self.credentials, "PUT", &request.object, request.expiry, now),
                fields: BTreeMap::new(),
            },
            PresignedOperation::Post { size_range } => signer::post_policy(
                &self.credentials,
                &request.object,
                request.expiry,
                size_range,
                now,
            ),
        };
        Ok(target)
    }
}
