//! Unified error handling for the HTTP layer.
//!
//! Every error renders as JSON `{"error": "...", "code": "..."}`. Server-side
//! failures are captured to Sentry and their details are never returned.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{RegistryError, SyncError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input from the client.
    #[error("{0}")]
    Validation(String),

    /// No merchant session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Resource not found (or not owned by the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Backup store cap reached.
    #[error("Maximum of {max} backup stores reached")]
    CapacityExceeded { max: usize },

    /// The store is not in a state that allows the operation.
    #[error("{message}")]
    Precondition { code: &'static str, message: String },

    /// The commerce platform failed.
    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotAuthenticated => "not_authenticated",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Precondition { code, .. } => *code,
            Self::Upstream { .. } => "upstream_error",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) | Self::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Self::Precondition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Upstream { .. }
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let error = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Upstream {
                status: Some(status),
                ..
            } => format!("Commerce platform error (status {status})"),
            Self::Upstream { status: None, .. } => "Commerce platform unavailable".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error,
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => Self::Validation(msg),
            RegistryError::InvalidCredential(domain) => {
                Self::Validation(format!("Invalid access token for {domain}"))
            }
            RegistryError::CapacityExceeded { max } => Self::CapacityExceeded { max },
            RegistryError::AlreadyExists => {
                Self::AlreadyExists("backup store is already registered".to_string())
            }
            RegistryError::NotFound => Self::NotFound("backup store".to_string()),
            RegistryError::Upstream(e) => Self::Upstream {
                status: e.status(),
                message: e.to_string(),
            },
            RegistryError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound => Self::NotFound("store".to_string()),
            SyncError::NoApiToken => Self::Precondition {
                code: "no_api_token",
                message: err.to_string(),
            },
            SyncError::NoEnabledBackups => Self::Precondition {
                code: "no_enabled_backups",
                message: err.to_string(),
            },
            SyncError::EmptyPrimaryCatalog => Self::Precondition {
                code: "empty_primary_catalog",
                message: err.to_string(),
            },
            SyncError::Upstream(e) => Self::Upstream {
                status: e.status(),
                message: e.to_string(),
            },
            SyncError::Repository(e) => Self::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::ShopifyError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Validation("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::NotAuthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::CapacityExceeded { max: 5 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::from(SyncError::NoApiToken)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let json = body_json(AppError::CapacityExceeded { max: 5 }.into_response()).await;
        assert_eq!(json["code"], "capacity_exceeded");
        assert_eq!(json["error"], "Maximum of 5 backup stores reached");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "password=hunter2".to_string(),
        ));
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "internal_error");
    }

    #[tokio::test]
    async fn test_upstream_exposes_status_only() {
        let err = AppError::from(RegistryError::Upstream(ShopifyError::Api {
            status: 503,
            message: "<html>secret upstream page</html>".to_string(),
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Commerce platform error (status 503)");
    }

    #[test]
    fn test_precondition_codes() {
        assert_eq!(
            AppError::from(SyncError::NoEnabledBackups).code(),
            "no_enabled_backups"
        );
        assert_eq!(
            AppError::from(SyncError::EmptyPrimaryCatalog).code(),
            "empty_primary_catalog"
        );
    }
}
