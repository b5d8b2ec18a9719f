//! End-user credential extractor.
//!
//! Reads the model provider key the caller supplies with each request from:
//! - `x-user-api-key: <key>` header
//! - `x-api-key: <key>` header (fallback)
//!
//! The key is never stored and is only forwarded to the agent call made
//! on behalf of this request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use forkline_core::agent::credential::Credential;

use crate::http::error::AppError;

pub const USER_API_KEY_HEADER: &str = "x-user-api-key";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credential supplied by the caller. Extraction fails with
/// `MISSING_CREDENTIAL` when neither header carries a non-blank value.
pub struct UserCredential(pub Credential);

impl<S: Send + Sync> FromRequestParts<S> for UserCredential {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_credential(parts).map(UserCredential)
    }
}

fn extract_credential(parts: &Parts) -> Result<Credential, AppError> {
    for header in [USER_API_KEY_HEADER, API_KEY_HEADER] {
        if let Some(value) = parts.headers.get(header) {
            let value = value.to_str().map_err(|_| {
                AppError::Validation(format!("Invalid {header} header encoding"))
            })?;
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Credential::new(value));
            }
        }
    }

    Err(AppError::MissingCredential)
}
