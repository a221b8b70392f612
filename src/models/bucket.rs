//! Bucket identifiers, listings and creation parameters.

use crate::services::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Retention applied when locking is requested without an explicit mode and period.
pub const DEFAULT_RETENTION_MODE: RetentionMode = RetentionMode::Compliance;
pub const DEFAULT_RETENTION_DAYS: i32 = 365;

/// Validated bucket name. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BucketRef {
    name: String,
}

impl BucketRef {
    /// Validate a caller-supplied bucket name.
    ///
    /// Accepts 3–63 characters drawn from lowercase letters, digits and hyphens.
    pub fn new(name: impl Into<String>) -> GatewayResult<Self> {
        let name = name.into();
        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(GatewayError::validation(format!(
                "bucket name `{name}` must be between {BUCKET_NAME_MIN_LEN} and {BUCKET_NAME_MAX_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        {
            return Err(GatewayError::validation(format!(
                "bucket name `{name}` may only contain lowercase letters, digits and hyphens"
            )));
        }
        Ok(Self { name })
    }

    /// Wrap a name reported by the store itself.
    ///
    /// Stores accept names (dots, legacy uppercase) that the gateway refuses to
    /// create, so listings must not be re-validated.
    pub(crate) fn from_store(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket `{}`", self.name)
    }
}

/// One entry of `list_buckets`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Object-lock retention mode, for bucket defaults and per-object retention.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionMode {
    #[serde(alias = "governance", alias = "Governance")]
    Governance,
    #[serde(alias = "compliance", alias = "Compliance")]
    Compliance,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Governance => "GOVERNANCE",
            RetentionMode::Compliance => "COMPLIANCE",
        }
    }
}

/// Default retention written into a bucket's object-lock configuration.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultRetention {
    pub mode: RetentionMode,
    pub days: i32,
}

/// Bucket versioning status as reported by the store.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersioningState {
    #[default]
    Unversioned,
    Enabled,
    Suspended,
}

/// Request body for bucket creation.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct BucketCreationSpec {
    pub name: String,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default)]
    pub object_locking: bool,
    #[serde(default)]
    pub retention_mode: Option<RetentionMode>,
    #[serde(default)]
    pub retention_days: Option<i32>,
}

impl BucketCreationSpec {
    /// Check the name and the argument combination before any store call.
    pub fn validate(&self) -> GatewayResult<BucketRef> {
        let bucket = BucketRef::new(self.name.clone())?;
        if let Some(days) = self.retention_days {
            if days <= 0 {
                return Err(GatewayError::validation(format!(
                    "retention_days must be positive, got {days}"
                )));
            }
        }
        if !self.object_locking && (self.retention_mode.is_some() || self.retention_days.is_some())
        {
            return Err(GatewayError::validation(
                "retention settings require object_locking to be enabled",
            ));
        }
        Ok(bucket)
    }

    /// Default retention to configure, if locking was requested.
    ///
    /// An explicit mode and period are used as given; if either is missing the
    /// bucket falls back to COMPLIANCE for 365 days.
    pub fn lock_retention(&self) -> Option<DefaultRetention> {
        if !self.object_locking {
            return None;
        }
        let retention = match (self.retention_mode, self.retention_days) {
            (Some(mode), Some(days)) => DefaultRetention { mode, days },
            _ => DefaultRetention {
                mode: DEFAULT_RETENTION_MODE,
                days: DEFAULT_RETENTION_DAYS,
            },
        };
        Some(retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_digits_and_hyphens() {
        let bucket = BucketRef::new("test-bucket-01").unwrap();
        assert_eq!(bucket.name(), "test-bucket-01");
    }

    #[test]
    fn rejects_short_and_malformed_names() {
        for name in ["ab", "Upper-Case", "under_score", "dots.inside", "", "white space"] {
            let err = BucketRef::new(name).unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)), "{name}");
        }
        assert!(BucketRef::new("a".repeat(64)).is_err());
    }

    #[test]
    fn retention_defaults_to_compliance_year_unless_fully_specified() {
        let mut spec = BucketCreationSpec {
            name: "locked".into(),
            object_locking: true,
            ..Default::default()
        };
        assert_eq!(
            spec.lock_retention(),
            Some(DefaultRetention {
                mode: RetentionMode::Compliance,
                days: 365
            })
        );

        spec.retention_mode = Some(RetentionMode::Governance);
        assert_eq!(spec.lock_retention().unwrap().mode, RetentionMode::Compliance);

        spec.retention_days = Some(30);
        assert_eq!(
            spec.lock_retention(),
            Some(DefaultRetention {
                mode: RetentionMode::Governance,
                days: 30
            })
        );
    }

    #[test]
    fn retention_without_locking_is_rejected() {
        let spec = BucketCreationSpec {
            name: "plain".into(),
            retention_days: Some(10),
            ..Default::default()
        };
        assert!(matches!(spec.validate(), Err(GatewayError::Validation(_))));
        assert_eq!(spec.lock_retention(), None);
    }

    #[test]
    fn creation_spec_parses_lowercase_modes() {
        let spec: BucketCreationSpec = serde_json::from_str(
            r#"{"name":"abc","object_locking":true,"retention_mode":"governance","retention_days":7}"#,
        )
        .unwrap();
        assert_eq!(spec.retention_mode, Some(RetentionMode::Governance));
        assert!(!spec.versioning);
    }
}
