use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bearmobile_common::SupportError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Core service error: {0}")]
    Core(#[from] SupportError),
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::WebSocket(_) => (StatusCode::BAD_REQUEST, "WEBSOCKET_ERROR"),
            ApiError::Core(err) => match err {
                SupportError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                SupportError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                SupportError::Model(_) => (StatusCode::BAD_GATEWAY, "MODEL_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(msg) | ApiError::WebSocket(msg) => msg.clone(),
            ApiError::Core(SupportError::Validation(msg))
            | ApiError::Core(SupportError::NotFound(msg)) => msg.clone(),
            ApiError::Core(SupportError::Model(_)) => {
                "The language model could not answer right now".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            error!("{}", self);
        }

        let response_body = json!({
            "success": false,
            "error": self.public_message(),
            "error_code": error_code,
            "timestamp": chrono::Utc::now()
        });

        (status, Json(response_body)).into_response()
    }
}

pub fn validation_error(message: &str) -> ApiError {
    ApiError::Validation(message.to_string())
}

pub type ApiResult<T> = Result<T, ApiError>;
