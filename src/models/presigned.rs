//! Presigned URL requests and the form descriptor issued for browser POST uploads.

use crate::{
    models::object::ObjectRef,
    services::error::{GatewayError, GatewayResult},
};
use serde::Serialize;
use std::{collections::BTreeMap, time::Duration};

/// Expiry used when the caller does not pass one.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Longest lifetime a SigV4 presigned request may carry.
pub const MAX_EXPIRY: Duration = DEFAULT_EXPIRY;

pub const DEFAULT_MIN_UPLOAD_SIZE: u64 = 1;
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Inclusive bounds enforced on the size of a POST upload.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl SizeRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> GatewayResult<Self> {
        let range = Self {
            min: min.unwrap_or(DEFAULT_MIN_UPLOAD_SIZE),
            max: max.unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
        };
        if range.max == 0 || range.min > range.max {
            return Err(GatewayError::validation(format!(
                "invalid upload size range {}..={}",
                range.min, range.max
            )));
        }
        Ok(range)
    }
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_UPLOAD_SIZE,
            max: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresignedOperation {
    Get,
    Put,
    Post { size_range: SizeRange },
}

/// What to sign and for how long.
#[derive(Clone, Debug, PartialEq)]
pub struct PresignedRequest {
    pub object: ObjectRef,
    pub operation: PresignedOperation,
    pub expiry: Duration,
}

impl PresignedRequest {
    /// `expiry_secs` defaults to seven days and must lie in `1..=604800`.
    pub fn new(
        object: ObjectRef,
        operation: PresignedOperation,
        expiry_secs: Option<u64>,
    ) -> GatewayResult<Self> {
        let expiry = expiry_secs.map(Duration::from_secs).unwrap_or(DEFAULT_EXPIRY);
        if expiry.is_zero() || expiry > MAX_EXPIRY {
            return Err(GatewayError::validation(format!(
                "expiry must be between 1 and {} seconds",
                MAX_EXPIRY.as_secs()
            )));
        }
        Ok(Self {
            object,
            operation,
            expiry,
        })
    }
}

/// Signed target produced by a backend.
///
/// `fields` is empty for GET and PUT; for POST it holds the form fields that
/// must accompany the upload.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PresignedTarget {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

/// Browser-form upload descriptor returned to callers of presigned POST.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PostPolicyForm {
    pub url: String,
    pub fields: BTreeMap<String, String>,
    /// Ready-to-run example upload; informational only.
    pub curl: String,
}
