use crate::services::signer::SigningCredentials;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, fmt, path::PathBuf, str::FromStr};

/// Which `ObjectStorage` implementation serves requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// S3-compatible endpoint via aws-sdk-s3.
    S3,
    /// In-process store; contents are lost on restart.
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "s3" => Ok(BackendKind::S3),
            "memory" => Ok(BackendKind::Memory),
            other => anyhow::bail!("unknown backend `{other}`, expected `s3` or `memory`"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub spool_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "HTTP gateway over S3-compatible object storage")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides OBJECT_GATEWAY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// S3 endpoint URL (overrides OBJECT_GATEWAY_S3_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// S3 region (overrides OBJECT_GATEWAY_S3_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Access key id (overrides OBJECT_GATEWAY_S3_ACCESS_KEY)
    #[arg(long)]
    pub access_key: Option<String>,

    /// Secret access key (overrides OBJECT_GATEWAY_S3_SECRET_KEY)
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Directory where uploads are spooled (overrides OBJECT_GATEWAY_SPOOL_DIR)
    #[arg(long)]
    pub spool_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over the variables `lookup` returns, over defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let env_port = match lookup("OBJECT_GATEWAY_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing OBJECT_GATEWAY_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_backend = match lookup("OBJECT_GATEWAY_BACKEND") {
            Some(value) => value
                .parse::<BackendKind>()
                .with_context(|| format!("parsing OBJECT_GATEWAY_BACKEND value `{}`", value))?,
            None => BackendKind::S3,
        };

        // --- Merge ---
        Ok(Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            endpoint: args
                .endpoint
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_S3_ENDPOINT", "http://127.0.0.1:9000")),
            region: args
                .region
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_S3_REGION", "us-east-1")),
            access_key: args
                .access_key
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_S3_ACCESS_KEY", "minioadmin")),
            secret_key: args
                .secret_key
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_S3_SECRET_KEY", "minioadmin")),
            spool_dir: args
                .spool_dir
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_SPOOL_DIR", "./data/spool").into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn signing_credentials(&self) -> SigningCredentials {
        SigningCredentials {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("spool_dir", &self.spool_dir)
            .finish()
    }
}
