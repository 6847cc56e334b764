use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use tilecast_core::DispatchError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        if err.is_validation() {
            return Self::bad_request(err.to_string());
        }
        tracing::error!(error = %err, "dispatch operation failed");
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn renders_a_flat_error_object() {
        let response = AppError::bad_request("file: /x.mp4 is not found in a storage").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value, json!({ "error": "file: /x.mp4 is not found in a storage" }));
    }

    #[test]
    fn validation_failures_are_client_errors() {
        let err = AppError::from(DispatchError::SourceNotFound("/x.mp4".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = AppError::from(DispatchError::QueueClosed);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
