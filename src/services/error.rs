//! Normalized failure kinds shared by the façade and every storage backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("bucket `{0}` is not empty")]
    NotEmpty(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    /// Stable machine-readable name used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::AlreadyExists(_) => "already_exists",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::NotEmpty(_) => "not_empty",
            GatewayError::Authorization(_) => "authorization",
            GatewayError::InvalidArgument(_) => "invalid_argument",
            GatewayError::Upload(_) => "upload",
            GatewayError::Download(_) => "download",
            GatewayError::Backend(_) => "backend",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
