use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sandbox_types::SandboxError;
use serde::Serialize;

/// Wraps [`SandboxError`] so it can be returned directly from axum handlers.
/// Every error body is shaped `{"detail": "..."}` per the external interface.
pub struct ApiError(pub SandboxError);

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { detail: self.0.to_string() })).into_response()
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        ApiError(e)
    }
}
