//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the storage backend answers

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Lists buckets against the backend. HTTP 200 when the call succeeds,
/// HTTP 503 otherwise, with the failure reported under `checks.backend`.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let backend_check = match service.list_buckets().await {
        Ok(_) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => {
            tracing::warn!("readiness check failed: {}", err);
            CheckStatus {
                ok: false,
                error: Some(err.to_string()),
            }
        }
    };

    let overall_ok = backend_check.ok;
    let mut checks = HashMap::new();
    checks.insert("backend", backend_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
