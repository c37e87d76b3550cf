// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::store::StoreError;
// endregion: --- Imports

// region:    --- Service Error

/// A single offending input field, reported back so the client can fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub msg: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, msg)])
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingField(field) => {
                ServiceError::invalid(field, format!("{} is required", field))
            }
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}

/// 필드 경로(`location.lat`) 순으로 정렬된 위반 목록으로 변환
impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut violations = Vec::new();
        collect_violations(None, &errors, &mut violations);
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::Validation(violations)
    }
}

fn collect_violations(
    prefix: Option<&str>,
    errors: &ValidationErrors,
    out: &mut Vec<FieldViolation>,
) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let msg = match &err.message {
                        Some(message) => message.to_string(),
                        None => format!("{} is invalid ({})", path, err.code),
                    };
                    out.push(FieldViolation::new(path.clone(), msg));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(Some(&path), inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_violations(Some(&format!("{}[{}]", path, index)), inner, out);
                }
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            ServiceError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "msg": msg }))).into_response()
            }
            ServiceError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "msg": msg }))).into_response()
            }
            ServiceError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "msg": msg }))).into_response()
            }
            ServiceError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "msg": msg }))).into_response()
            }
            ServiceError::Upstream(cause) => {
                error!("{:<12} --> {}", "Handler", cause);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error").into_response()
            }
        }
    }
}

// endregion: --- Service Error
