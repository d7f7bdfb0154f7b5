//! API error type with IntoResponse
//!
//! Errors become `{"error": <kind>, "message": <text>}` bodies. Messages are
//! fixed strings or derived from validated request input; database text only
//! ever reaches the log.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::{ConstraintKind, StorageError};
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Field validation failed (400)
    Validation(ValidationError),

    /// Body, query string or path could not be decoded (400)
    BadRequest { message: String },

    /// No valid session (401)
    Unauthorized { reason: &'static str },

    /// Session lacks a permission (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Write conflicts with existing data (409)
    Conflict {
        kind: ConstraintKind,
        constraint: Option<String>,
    },

    /// Request ran past the configured deadline (408)
    Timeout,

    /// Database temporarily unavailable (503)
    Unavailable(StorageError),

    /// Anything else (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Stable, user-facing text for the constraints the schema defines.
fn conflict_message(kind: ConstraintKind, constraint: Option<&str>) -> &'static str {
    match (kind, constraint) {
        (_, Some("auth_user_cpf_key")) => "an account with this cpf already exists",
        (_, Some("auth_user_email_key")) => "an account with this email already exists",
        (_, Some("forms_patient_information_user_id_key")) => {
            "patient information already exists for this user"
        }
        (_, Some("forms_sociodemographic_evaluation_diseases_check")) => {
            "diseases must list at least one entry"
        }
        (_, Some("forms_sociodemographic_evaluation_medicines_check")) => {
            "medicines must list at least one entry"
        }
        (ConstraintKind::ForeignKey, _) => "the resource is still referenced by other records",
        (ConstraintKind::Unique, _) => "a resource with these values already exists",
        _ => "the request conflicts with existing data",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({
                "error": "validation_error",
                "message": e.to_string()
            }),
            Self::BadRequest { message } => json!({
                "error": "bad_request",
                "message": message
            }),
            Self::Unauthorized { reason } => json!({
                "error": "unauthorized",
                "message": reason
            }),
            Self::Forbidden { reason } => json!({
                "error": "forbidden",
                "message": reason
            }),
            Self::NotFound { resource, id } => json!({
                "error": "not_found",
                "message": format!("{} '{}' not found", resource, id)
            }),
            Self::Conflict { kind, constraint } => {
                tracing::info!(kind = kind.as_str(), constraint = ?constraint, "constraint violation");
                json!({
                    "error": "conflict",
                    "message": conflict_message(*kind, constraint.as_deref())
                })
            }
            Self::Timeout => json!({
                "error": "request_timeout",
                "message": "the request took too long to complete"
            }),
            Self::Unavailable(e) => {
                tracing::warn!(error = %e, "database unavailable");
                json!({
                    "error": "service_unavailable",
                    "message": "the service is temporarily unavailable, try again later"
                })
            }
            Self::Internal { message } => {
                // Log the actual error, return generic message
                tracing::error!("Internal error: {}", message);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { resource, id } => Self::NotFound { resource, id },
            StorageError::ConstraintViolation { kind, constraint } => {
                Self::Conflict { kind, constraint }
            }
            e if e.is_transient() => Self::Unavailable(e),
            e => Self::internal(format!("database error: {e:?}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "cpf" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let err = ApiError::from(StorageError::NotFound {
            resource: "user",
            id: "7".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "user '7' not found");
    }

    #[tokio::test]
    async fn constraint_violation_is_409_with_stable_text() {
        let err = ApiError::from(StorageError::ConstraintViolation {
            kind: ConstraintKind::Unique,
            constraint: Some("auth_user_cpf_key".into()),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "conflict");
        assert_eq!(body["message"], "an account with this cpf already exists");
    }

    #[tokio::test]
    async fn transient_errors_are_503() {
        for e in [
            StorageError::PoolExhausted {
                timeout: Duration::from_secs(1),
            },
            StorageError::Timeout { after: None },
            StorageError::Connectivity(sqlx::Error::PoolClosed),
        ] {
            let response = ApiError::from(e).into_response();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = ApiError::from(StorageError::Internal(sqlx::Error::ColumnNotFound(
            "secret_column".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body.to_string().contains("secret_column"));
    }

    #[tokio::test]
    async fn timeout_is_408_json() {
        let response = ApiError::Timeout.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "request_timeout");
    }

    #[tokio::test]
    async fn auth_errors() {
        let response = ApiError::Unauthorized {
            reason: "missing session token",
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::Forbidden {
            reason: "missing permission create_admin".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
