use anyhow::{Context, Result};
use axum::Router;
use object_gateway::{
    config::{AppConfig, BackendKind},
    routes,
    services::{
        backend::ObjectStorage, memory_backend::MemoryStorage, s3_backend::S3Storage,
        storage_service::StorageService,
    },
};
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting object-gateway with config: {:?}", cfg);

    // --- Initialize backend ---
    let backend: Arc<dyn ObjectStorage> = match cfg.backend {
        BackendKind::S3 => {
            fs::create_dir_all(&cfg.spool_dir)
                .await
                .with_context(|| format!("creating spool directory {}", cfg.spool_dir.display()))?;
            tracing::info!("Spooling uploads under {}", cfg.spool_dir.display());
            Arc::new(S3Storage::new(cfg.signing_credentials(), cfg.spool_dir.clone()))
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend; stored objects are lost on shutdown");
            Arc::new(MemoryStorage::new(cfg.signing_credentials()))
        }
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(StorageService::new(backend));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr)
                .await
                .with_context(|| format!("binding {}", fallback_addr))?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
