//! # Web API Error Types
//!
//! Errors returned by the trigger routes and their HTTP response conversions.
//! Every error renders as `{"error": {"code": ..., "message": ...}}`.

use crate::error::ProvisioningError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Job not found: {message}")]
    NotFound { message: String },

    #[error("Invalid tenant: {message}")]
    InvalidTenant { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Invalid UUID format: {uuid}")]
    InvalidUuid { uuid: String },

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("JSON serialization/deserialization error")]
    JsonError,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn invalid_uuid(uuid: impl Into<String>) -> Self {
        Self::InvalidUuid { uuid: uuid.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::NotFound { message } => {
                (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", message.as_str())
            }

            ApiError::InvalidTenant { message } => {
                (StatusCode::BAD_REQUEST, "INVALID_TENANT", message.as_str())
            }

            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.as_str())
            }

            ApiError::InvalidUuid { uuid } => {
                (StatusCode::BAD_REQUEST, "INVALID_UUID", uuid.as_str())
            }

            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.as_str()),

            ApiError::JsonError => (StatusCode::BAD_REQUEST, "JSON_ERROR", "Invalid JSON format"),

            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::InvalidTenant(message) => ApiError::InvalidTenant { message },
            ProvisioningError::JobNotFound(job_id) => ApiError::NotFound {
                message: job_id.to_string(),
            },
            err @ (ProvisioningError::JobNotFinished(_)
            | ProvisioningError::JobAlreadyTornDown(_)) => ApiError::Conflict {
                code: err.error_code(),
                message: err.to_string(),
            },
            other => {
                error!(error = %other, code = other.error_code(), "Unhandled provisioning error");
                ApiError::Internal
            }
        }
    }
}

impl From<uuid::Error> for ApiError {
    fn from(_: uuid::Error) -> Self {
        ApiError::invalid_uuid("Invalid UUID format")
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(_: serde_json::Error) -> Self {
        ApiError::JsonError
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_provisioning_error_mapping() {
        let response = ApiError::from(ProvisioningError::InvalidTenant("empty".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(ProvisioningError::JobNotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            ApiError::from(ProvisioningError::JobNotFinished(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let error = ApiError::from(ProvisioningError::JobAlreadyTornDown(Uuid::new_v4()));
        assert!(matches!(
            error,
            ApiError::Conflict {
                code: "JOB_ALREADY_TORN_DOWN",
                ..
            }
        ));
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);

        let response = ApiError::from(ProvisioningError::Internal("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
