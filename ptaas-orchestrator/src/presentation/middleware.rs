//! HTTP middleware and error mapping

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::domain::errors::ScanError;
use crate::presentation::models::ErrorResponse;

/// Request logging middleware
pub async fn logging_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Processing request"
    );

    let response = next.run(request).await;
    let duration = start_time.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Json(ErrorResponse {
        code: code.to_string(),
        message: message.to_string(),
        details: None,
        request_id: Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
    });

    (status, body).into_response()
}

/// Handler error carrying a [`ScanError`]
#[derive(Debug)]
pub struct ApiError(pub ScanError);

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        Self(err)
    }
}

pub fn status_for(error: &ScanError) -> StatusCode {
    match error {
        ScanError::Validation(_) => StatusCode::BAD_REQUEST,
        ScanError::ToolUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ScanError::ToolExecution { .. } | ScanError::UpstreamApi { .. } => StatusCode::BAD_GATEWAY,
        ScanError::NotFound(_) => StatusCode::NOT_FOUND,
        ScanError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ScanError::Cancelled(_)
        | ScanError::Storage(_)
        | ScanError::Queue(_)
        | ScanError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "Request failed");
        }
        error_response(status, self.0.code(), &self.0.to_string())
    }
}
