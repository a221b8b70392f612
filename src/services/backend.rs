//! Capability interface the gateway requires from an object store.
//!
//! Implementations classify their own failures into [`GatewayError`] so the
//! façade never sees SDK-specific error types.
//!
//! [`GatewayError`]: crate::services::error::GatewayError

use crate::{
    models::{
        bucket::{BucketInfo, BucketRef, DefaultRetention, VersioningState},
        object::{
            IncompleteUpload, ObjectBody, ObjectDownload, ObjectMetadata, ObjectRef,
            ObjectRetention, ObjectSummary, RemoveFailure,
        },
        presigned::{PresignedRequest, PresignedTarget},
    },
    services::error::GatewayResult,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

/// Tags attached to a single object.
pub type TagSet = BTreeMap<String, String>;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    // === Buckets ===

    async fn list_buckets(&self) -> GatewayResult<Vec<BucketInfo>>;

    /// `Ok(false)` when the bucket is absent; errors are reserved for failures.
    async fn bucket_exists(&self, bucket: &BucketRef) -> GatewayResult<bool>;

    /// Create a bucket. Object lock can only be switched on at creation time.
    async fn create_bucket(&self, bucket: &BucketRef, object_locking: bool) -> GatewayResult<()>;

    async fn enable_versioning(&self, bucket: &BucketRef) -> GatewayResult<()>;

    async fn put_object_lock(
        &self,
        bucket: &BucketRef,
        retention: DefaultRetention,
    ) -> GatewayResult<()>;

    /// Install a rule expiring every object in the bucket after `days`.
    async fn put_expiration_rule(
        &self,
        bucket: &BucketRef,
        rule_id: &str,
        days: i32,
    ) -> GatewayResult<()>;

    async fn remove_bucket(&self, bucket: &BucketRef) -> GatewayResult<()>;

    /// Lazily list every object in the bucket, starting from scratch on each call.
    fn list_objects(&self, bucket: &BucketRef) -> BoxStream<'static, GatewayResult<ObjectSummary>>;

    async fn list_incomplete_uploads(
        &self,
        bucket: &BucketRef,
    ) -> GatewayResult<Vec<IncompleteUpload>>;

    async fn get_bucket_policy(&self, bucket: &BucketRef) -> GatewayResult<String>;

    async fn set_bucket_policy(&self, bucket: &BucketRef, policy: &str) -> GatewayResult<()>;

    async fn get_versioning(&self, bucket: &BucketRef) -> GatewayResult<VersioningState>;

    // === Objects ===

    /// Stream `body` into the store. `size`, when known, must match the bytes sent.
    async fn put_object(
        &self,
        object: &ObjectRef,
        body: ObjectBody<'_>,
        size: Option<u64>,
        content_type: &str,
    ) -> GatewayResult<ObjectMetadata>;

    async fn get_object(&self, object: &ObjectRef) -> GatewayResult<ObjectDownload>;

    async fn stat_object(&self, object: &ObjectRef) -> GatewayResult<ObjectMetadata>;

    async fn copy_object(&self, source: &ObjectRef, target: &ObjectRef) -> GatewayResult<()>;

    async fn remove_object(&self, object: &ObjectRef) -> GatewayResult<()>;

    /// Best-effort batch delete; returns the keys the store refused.
    async fn remove_objects(
        &self,
        bucket: &BucketRef,
        keys: &[String],
    ) -> GatewayResult<Vec<RemoveFailure>>;

    async fn set_legal_hold(&self, object: &ObjectRef, enabled: bool) -> GatewayResult<()>;

    async fn get_legal_hold(&self, object: &ObjectRef) -> GatewayResult<bool>;

    async fn set_object_retention(
        &self,
        object: &ObjectRef,
        retention: &ObjectRetention,
    ) -> GatewayResult<()>;

    async fn get_object_retention(&self, object: &ObjectRef) -> GatewayResult<ObjectRetention>;

    async fn set_object_tags(&self, object: &ObjectRef, tags: &TagSet) -> GatewayResult<()>;

    async fn get_object_tags(&self, object: &ObjectRef) -> GatewayResult<TagSet>;

    async fn remove_object_tags(&self, object: &ObjectRef) -> GatewayResult<()>;

    // === Presigning ===

    async fn presign(&self, request: &PresignedRequest) -> GatewayResult<PresignedTarget>;
}
