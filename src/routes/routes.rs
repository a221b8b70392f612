//! Defines routes for every gateway operation.
//!
//! ## Structure
//! - **Bucket endpoints** under `/buckets`
//!   - `GET    /buckets`: list buckets
//!   - `POST   /buckets`: create bucket (JSON `BucketCreationSpec`)
//!   - `GET    /buckets/latest-object`: newest object across all buckets
//!   - `DELETE /buckets/{bucket}`: remove bucket
//!   - `GET    /buckets/{bucket}/exists|latest-object|uploads|versioning`
//!   - `GET|PUT /buckets/{bucket}/policy`
//!   - `GET|POST|DELETE /buckets/{bucket}/objects`: list keys, form upload, batch delete
//!
//! - **Object endpoints**
//!   - `PUT|GET|HEAD|DELETE /buckets/{bucket}/objects/{*key}`
//!   - `/objects/{stat,base64,copy,legal-hold,retention,tags}` addressed by `?bucket=&key=`
//!
//! - **Presigning** under `/presigned/{get,put,post}`
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        bucket_handlers::{
            bucket_exists, create_bucket, get_bucket_policy, get_versioning, latest_object,
            latest_object_in_bucket, list_buckets, list_incomplete_uploads, list_objects,
            remove_bucket, remove_objects, set_bucket_policy, upload_form,
        },
        health_handlers::{healthz, readyz},
        object_handlers::{
            copy_object, delete_object, get_legal_hold, get_object, get_object_base64,
            get_retention, get_tags, head_object, remove_tags, set_legal_hold, set_retention,
            set_tags, stat_object, upload_object,
        },
        presigned_handlers::{presigned_get, presigned_post, presigned_put},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Bucket-level routes
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/latest-object", get(latest_object))
        .route("/buckets/{bucket}", delete(remove_bucket))
        .route("/buckets/{bucket}/exists", get(bucket_exists))
        .route("/buckets/{bucket}/latest-object", get(latest_object_in_bucket))
        .route("/buckets/{bucket}/uploads", get(list_incomplete_uploads))
        .route(
            "/buckets/{bucket}/policy",
            get(get_bucket_policy).put(set_bucket_policy),
        )
        .route("/buckets/{bucket}/versioning", get(get_versioning))
        .route(
            "/buckets/{bucket}/objects",
            get(list_objects).post(upload_form).delete(remove_objects),
        )
        // Object-level routes
        .route(
            "/buckets/{bucket}/objects/{*key}",
            get(get_object)
                .put(upload_object)
                .head(head_object)
                .delete(delete_object),
        )
        .route("/objects/stat", get(stat_object))
        .route("/objects/base64", get(get_object_base64))
        .route("/objects/copy", post(copy_object))
        .route(
            "/objects/legal-hold",
            get(get_legal_hold).put(set_legal_hold),
        )
        .route("/objects/retention", get(get_retention).put(set_retention))
        .route(
            "/objects/tags",
            get(get_tags).put(set_tags).delete(remove_tags),
        )
        // Presigning
        .route("/presigned/get", get(presigned_get))
        .route("/presigned/put", get(presigned_put))
        .route("/presigned/post", get(presigned_post))
}
