//! Error taxonomy for the request path.
//!
//! Every variant maps to a user-safe HTTP response in `IntoResponse`.
//! Storage and internal failures are logged with full context here and
//! surfaced as a generic 500 — raw error detail never crosses the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range user input. Per-field message keys; nothing
    /// was written.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    /// Duplicate username/email at signup, or referral fan-out limit
    /// exceeded. The payload is a translation key for a form-level message.
    #[error("identity conflict: {0}")]
    IdentityConflict(String),

    /// A scoring-engine precondition failed (e.g. income <= 0). Terminal for
    /// the submission; distinct from plain field validation.
    #[error("precondition failed on {field}: {message}")]
    Precondition { field: String, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "validation_failed", "fields": fields })),
            )
                .into_response(),
            AppError::IdentityConflict(key) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "identity_conflict", "message": key })),
            )
                .into_response(),
            AppError::Precondition { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "computation_precondition",
                    "field": field,
                    "message": message,
                })),
            )
                .into_response(),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "forbidden" })),
            )
                .into_response(),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "not_found" })),
            )
                .into_response(),
            AppError::Storage(e) => {
                tracing::error!(err = %e, "storage error in request path");
                generic_500()
            }
            AppError::Internal(e) => {
                tracing::error!(err = %e, "internal error in request path");
                generic_500()
            }
        }
    }
}

fn generic_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_422() {
        let mut fields = BTreeMap::new();
        fields.insert("income".to_string(), "income_invalid".to_string());
        let resp = AppError::Validation(fields).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp = AppError::IdentityConflict("auth_email_taken".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_error_hides_detail() {
        let resp = AppError::Storage(sqlx::Error::RowNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
