//! Object identifiers and the records returned for stored objects.

use crate::{
    models::bucket::{BucketRef, RetentionMode},
    services::error::{GatewayError, GatewayResult},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::{fmt, io};

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Content type used when the caller does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Streaming object payload, in either direction.
pub type ObjectBody<'a> = BoxStream<'a, io::Result<Bytes>>;

/// A bucket plus an object key. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    bucket: BucketRef,
    key: String,
}

impl ObjectRef {
    pub fn new(bucket: BucketRef, key: impl Into<String>) -> GatewayResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(GatewayError::validation("object key must not be empty"));
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(GatewayError::validation(format!(
                "object key exceeds {MAX_OBJECT_KEY_LEN} bytes"
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(GatewayError::validation(
                "object key must not contain control characters",
            ));
        }
        Ok(Self { bucket, key })
    }

    /// Validate both halves of a caller-supplied reference.
    pub fn parse(bucket: &str, key: &str) -> GatewayResult<Self> {
        Self::new(BucketRef::new(bucket)?, key)
    }

    pub fn bucket(&self) -> &BucketRef {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last path segment of the key, used as a download filename.
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.key)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object `{}/{}`", self.bucket.name(), self.key)
    }
}

/// Metadata returned by stat and upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// One entry of an object listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A multipart upload that was started and never completed or aborted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IncompleteUpload {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<DateTime<Utc>>,
}

/// Per-object retention.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ObjectRetention {
    pub mode: RetentionMode,
    pub retain_until: DateTime<Utc>,
}

/// A key the store refused to delete during a batch removal.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoveFailure {
    pub key: String,
    pub message: String,
}

/// An open download: metadata plus the body stream.
///
/// Dropping the value releases the upstream connection.
pub struct ObjectDownload {
    pub metadata: ObjectMetadata,
    pub body: ObjectBody<'static>,
}

impl fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_control_keys() {
        assert!(ObjectRef::parse("bucket", "").is_err());
        assert!(ObjectRef::parse("bucket", "bad\nkey").is_err());
        assert!(ObjectRef::parse("bucket", &"k".repeat(1025)).is_err());
        assert!(ObjectRef::parse("BAD", "key").is_err());
    }

    #[test]
    fn file_name_is_last_segment() {
        let object = ObjectRef::parse("bucket", "photos/2025/img.jpg").unwrap();
        assert_eq!(object.file_name(), "img.jpg");

        let trailing = ObjectRef::parse("bucket", "dir/").unwrap();
        assert_eq!(trailing.file_name(), "dir");
    }
}
