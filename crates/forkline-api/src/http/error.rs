//! Application error type mapping to HTTP status codes.
//!
//! Error bodies look like:
//! ```json
//! {
//!   "detail": "Chat 9 not found",
//!   "errors": [{ "code": "CHAT_NOT_FOUND", "message": "Chat 9 not found" }],
//!   "meta": { "request_id": "...", "timestamp": "..." }
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use forkline_types::error::ChatError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat, fork and pipeline errors.
    Chat(ChatError),
    /// The end-user credential header is absent or blank.
    MissingCredential,
    /// Validation error.
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    /// Status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::ChatNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "CHAT_NOT_FOUND",
                format!("Chat {id} not found"),
            ),
            AppError::Chat(e @ ChatError::ParentMessageNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "PARENT_MESSAGE_NOT_FOUND", e.to_string())
            }
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::Upstream(e)) => (
                StatusCode::BAD_GATEWAY,
                "AGENT_RUNTIME_ERROR",
                format!("Agent runtime error: {e}"),
            ),
            AppError::Chat(ChatError::Storage(e)) => {
                tracing::error!(error = %e, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Storage failure".to_string(),
                )
            }
            AppError::MissingCredential => (
                StatusCode::BAD_REQUEST,
                "MISSING_CREDENTIAL",
                "Missing API key. Provide it via the 'x-user-api-key' header.".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "detail": message,
            "errors": [{
                "code": code,
                "message": message,
            }],
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
