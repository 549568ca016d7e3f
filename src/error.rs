//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Account already exists: {0}")]
    AccountExists(Uuid),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Commit retries exhausted for account {account_id} after {attempts} attempts")]
    RetriesExhausted { account_id: Uuid, attempts: u32 },

    #[error("Timed out after {timeout_ms}ms while accessing account {account_id}")]
    CommitTimeout { account_id: Uuid, timeout_ms: u64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AccountNotFound(id) => DomainError::AccountNotFound(id).into(),
            RepositoryError::ConcurrencyConflict {
                expected, actual, ..
            } => DomainError::ConcurrentModification {
                expected,
                found: actual,
            }
            .into(),
            RepositoryError::AccountExists(id) => AppError::AccountExists(id),
            RepositoryError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// HTTP status, stable error code and structured details
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                Some(json!({ "message": msg })),
            ),

            // 409 Conflict
            AppError::AccountExists(id) => (
                StatusCode::CONFLICT,
                "account_exists",
                Some(json!({ "account_id": id })),
            ),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => {
                let status = match domain_err {
                    DomainError::InvalidReductionAmount { .. }
                    | DomainError::InvalidMaxFlexUsage { .. }
                    | DomainError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                    DomainError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                    DomainError::FlexDisabled { .. }
                    | DomainError::UsageLimitExceeded { .. }
                    | DomainError::InsufficientTerm { .. }
                    | DomainError::MaxFlexUsageBelowUsage { .. }
                    | DomainError::ForecastUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    DomainError::InvalidAccount(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, domain_err.code(), Some(domain_err.details()))
            }

            // 503 Service Unavailable
            AppError::RetriesExhausted {
                account_id,
                attempts,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "retries_exhausted",
                Some(json!({ "account_id": account_id, "attempts": attempts })),
            ),
            AppError::CommitTimeout {
                account_id,
                timeout_ms,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "commit_timeout",
                Some(json!({ "account_id": account_id, "timeout_ms": timeout_ms })),
            ),

            // 500 Internal Server Error
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        if status.is_server_error() {
            tracing::error!(error_code, error = ?self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_domain_status_mapping() {
        let cases = [
            (
                DomainError::InvalidReductionAmount {
                    amount: dec!(99),
                    min: dec!(100),
                    max: dec!(2500),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::UsageLimitExceeded { used: 3, max: 3 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DomainError::AccountNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                DomainError::ConcurrentModification {
                    expected: 1,
                    found: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::ForecastUnavailable {
                    available: 0,
                    required: 3,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_repository_error_conversion() {
        let id = Uuid::new_v4();
        let err: AppError = RepositoryError::ConcurrencyConflict {
            account_id: id,
            expected: 4,
            actual: 5,
        }
        .into();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::ConcurrentModification { expected: 4, found: 5 })
        ));

        let err: AppError = RepositoryError::AccountNotFound(id).into();
        assert!(matches!(err, AppError::Domain(DomainError::AccountNotFound(found)) if found == id));
    }

    #[test]
    fn test_exhausted_retries_are_unavailable() {
        let err = AppError::RetriesExhausted {
            account_id: Uuid::new_v4(),
            attempts: 3,
        };
        let (status, code, details) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "retries_exhausted");
        assert_eq!(details.unwrap()["attempts"], 3);
    }
}
