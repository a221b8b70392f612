use crate::{
    models::outcome::{ErrorDetail, OperationOutcome},
    services::error::GatewayError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// HTTP-facing error: a status, a machine-readable kind and a message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 raised by the HTTP layer itself (bad form, bad header).
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Validation(_) | GatewayError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AlreadyExists(_) | GatewayError::NotEmpty(_) => StatusCode::CONFLICT,
            GatewayError::Upload(_) | GatewayError::Download(_) | GatewayError::Backend(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} ({})", self.message, self.status);
        }
        let body = Json(OperationOutcome::<()>::failure(ErrorDetail {
            message: self.message,
            kind: self.kind.to_string(),
            status: self.status.as_u16(),
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_statuses() {
        let cases = [
            (GatewayError::validation("x"), StatusCode::BAD_REQUEST),
            (GatewayError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (GatewayError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (GatewayError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GatewayError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (GatewayError::NotEmpty("x".into()), StatusCode::CONFLICT),
            (GatewayError::Upload("x".into()), StatusCode::BAD_GATEWAY),
            (GatewayError::Backend("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            let kind = err.kind();
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.kind, kind);
        }
    }

    #[tokio::test]
    async fn renders_failure_envelope() {
        let response = AppError::from(GatewayError::NotFound("bucket `gone`".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["error"]["kind"], "not_found");
        assert_eq!(body["error"]["status"], 404);
        assert_eq!(body["error"]["message"], "bucket `gone` not found");
    }
}
