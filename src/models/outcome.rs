//! Uniform response envelope shared by every JSON endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Either `{"success": true, "data": ..}` or `{"success": false, "error": ..}`.
#[derive(Serialize, Debug)]
pub struct OperationOutcome<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    pub message: String,
    pub kind: String,
    pub status: u16,
}

impl<T> OperationOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl OperationOutcome<()> {
    pub fn failure(detail: ErrorDetail) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(detail),
        }
    }
}

impl<T: Serialize> IntoResponse for OperationOutcome<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
