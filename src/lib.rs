//! HTTP gateway over S3-compatible object storage.
//!
//! [`routes::routes::routes`] builds the axum router; it needs a
//! [`StorageService`](services::storage_service::StorageService) wrapping any
//! [`ObjectStorage`](services::backend::ObjectStorage) implementation.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
