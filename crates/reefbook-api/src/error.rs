//! API server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use reefbook_core::error::DomainError;

/// Errors that can occur while starting or running the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable was set to an unusable value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Schema setup or another startup step failed in the domain layer.
    #[error("startup error: {0}")]
    Startup(#[from] DomainError),

    /// Database connection pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Socket binding or another I/O failure.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body every error response carries.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable code for clients to branch on.
    pub error: &'static str,
    /// Operator-facing description.
    pub message: String,
    /// Present and true when retrying the same request can succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Where to look next, when there is a better move than retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl ErrorBody {
    /// A plain error body with no retry metadata.
    #[must_use]
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            retryable: None,
            hint: None,
        }
    }
}

/// HTTP-layer wrapper that maps a [`DomainError`] onto a status code
/// and JSON body. Handlers return `Result<_, ApiError>` and use `?` on
/// domain calls.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            DomainError::RevisionConflict { .. } => (StatusCode::CONFLICT, "revision_conflict"),
            DomainError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            DomainError::UpstreamTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "upstream_timeout"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        // The denial reason stays in the logs; clients get a fixed line.
        let message = match &self.0 {
            DomainError::Unauthorized { reason } => {
                tracing::warn!(reason = %reason, "request forbidden");
                "you do not have access to this resource".to_owned()
            }
            other => other.to_string(),
        };

        let mut body = ErrorBody::new(code, message);
        if self.0.is_retryable() {
            body.retryable = Some(true);
        }
        if matches!(self.0, DomainError::UpstreamTimeout(_)) {
            body.hint = Some("poll GET /api/payments/status/{order_id} for the final outcome");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use uuid::Uuid;

    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    async fn body_of(err: DomainError) -> serde_json::Value {
        let response = ApiError(err).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_domain_errors_map_to_expected_statuses() {
        assert_eq!(
            status_of(DomainError::Validation("bad".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::NotFound {
                entity: "booking",
                id: Uuid::nil().to_string(),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::Conflict("already paid".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::RevisionConflict {
                entity: "booking",
                id: Uuid::nil(),
                expected: 3,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::Unauthorized {
                reason: "customer acted on a foreign booking".to_owned(),
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::UpstreamTimeout("gateway".to_owned())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(DomainError::Infrastructure("db down".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_forbidden_body_does_not_leak_the_reason() {
        // Arrange
        let err = DomainError::Unauthorized {
            reason: "customer 42 tried to confirm a bank transfer".to_owned(),
        };

        // Act
        let body = body_of(err).await;

        // Assert
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["message"], "you do not have access to this resource");
        assert!(body.get("retryable").is_none());
    }

    #[tokio::test]
    async fn test_upstream_timeout_body_marks_retryable_with_hint() {
        // Arrange
        let err = DomainError::UpstreamTimeout("payment gateway: deadline".to_owned());

        // Act
        let body = body_of(err).await;

        // Assert
        assert_eq!(body["error"], "upstream_timeout");
        assert_eq!(body["retryable"], true);
        assert!(
            body["hint"]
                .as_str()
                .unwrap()
                .contains("/api/payments/status")
        );
    }

    #[tokio::test]
    async fn test_revision_conflict_is_retryable() {
        // Arrange
        let err = DomainError::RevisionConflict {
            entity: "booking",
            id: Uuid::nil(),
            expected: 7,
        };

        // Act
        let body = body_of(err).await;

        // Assert
        assert_eq!(body["error"], "revision_conflict");
        assert_eq!(body["retryable"], true);
        assert!(body.get("hint").is_none());
    }
}
