//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const UNAUTHORIZED_DETAIL: &str = "authorization required";
pub const FORBIDDEN_DETAIL: &str =
    "access forbidden: you do not have permission to perform this action";
pub const REPOSITORY_DETAIL: &str = "repository operation failed";
pub const DATABASE_SERVICE: &str = "database";
pub const DATABASE_CONNECTION_DETAIL: &str = "database connection failed";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid environment variable {name}: {reason}")]
    InvalidVar { name: String, reason: String },
    #[error("invalid schema {schema}: field '{field}' {reason}")]
    InvalidSchema {
        schema: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    /// Data-mapping and repository-layer failures. Status defaults to 500.
    #[error("{detail}")]
    Repository { detail: String, status: StatusCode },
    #[error("access denied")]
    AccessDenied,
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage: {0}")]
    Storage(String),
}

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Unauthorized(UNAUTHORIZED_DETAIL.into())
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden(FORBIDDEN_DETAIL.into())
    }

    pub fn repository(detail: impl Into<String>) -> Self {
        AppError::Repository {
            detail: detail.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn repository_with_status(detail: impl Into<String>, status: StatusCode) -> Self {
        AppError::Repository {
            detail: detail.into(),
            status,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::Repository { status, .. } => *status,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Db(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Repository { .. } => "repository_error",
            AppError::AccessDenied => "access_denied",
            AppError::Validation(_) => "validation_error",
            AppError::Db(_) => "database_error",
            AppError::Config(_) => "config_error",
            AppError::Storage(_) => "storage_error",
        }
    }
}

/// Failure of a dependency the process needs to serve requests. Not an HTTP error.
#[derive(Error, Debug)]
pub enum ServiceHealthError {
    #[error("{service}: {detail}")]
    Unavailable { service: String, detail: String },
    #[error("database: {0}")]
    DatabaseConnection(String),
}

impl ServiceHealthError {
    pub fn unavailable(service: impl Into<String>) -> Self {
        ServiceHealthError::Unavailable {
            service: service.into(),
            detail: "connection unavailable".into(),
        }
    }

    pub fn database() -> Self {
        ServiceHealthError::DatabaseConnection(DATABASE_CONNECTION_DETAIL.into())
    }

    pub fn service_name(&self) -> &str {
        match self {
            ServiceHealthError::Unavailable { service, .. } => service,
            ServiceHealthError::DatabaseConnection(_) => DATABASE_SERVICE,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_http_mapping() {
        assert_eq!(AppError::unauthorized().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::repository("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::repository_with_status("gone", StatusCode::NOT_FOUND).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn default_details() {
        assert_eq!(AppError::unauthorized().to_string(), UNAUTHORIZED_DETAIL);
        assert_eq!(AppError::forbidden().to_string(), FORBIDDEN_DETAIL);
        assert_eq!(AppError::repository(REPOSITORY_DETAIL).to_string(), REPOSITORY_DETAIL);
    }

    #[test]
    fn health_errors_name_their_service() {
        let err = ServiceHealthError::database();
        assert_eq!(err.service_name(), "database");
        assert_eq!(err.to_string(), "database: database connection failed");

        let err = ServiceHealthError::unavailable("s3");
        assert_eq!(err.service_name(), "s3");
        assert_eq!(err.to_string(), "s3: connection unavailable");
    }

    #[test]
    fn error_response_carries_status() {
        let resp = AppError::AccessDenied.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
