use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Payment required: {0}")]
    PaymentRequired(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    /// Error carrying a service-specific error code. The message is rendered
    /// verbatim, so it must never contain internal detail.
    #[error("{code}: {message}")]
    Domain {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn domain(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        AppError::Domain {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_, _) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) | AppError::DatabaseError(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Domain { status, .. } => *status,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, retry_after) = match self {
            AppError::ValidationError(err) => {
                ("VALIDATION_ERROR", format!("Validation error: {}", err), None)
            }
            AppError::BadRequest(err) => ("BAD_REQUEST", err.to_string(), None),
            AppError::NotFound(err) => ("NOT_FOUND", err.to_string(), None),
            AppError::Unauthorized(err) => ("UNAUTHENTICATED", err.to_string(), None),
            AppError::PaymentRequired(err) => ("PAYMENT_REQUIRED", err.to_string(), None),
            AppError::Forbidden(err) => ("FORBIDDEN", err.to_string(), None),
            AppError::Conflict(err) => ("CONFLICT", err.to_string(), None),
            AppError::TooManyRequests(msg, retry) => ("TOO_MANY_REQUESTS", msg, retry),
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal error");
                ("INTERNAL_ERROR", "Internal server error".to_string(), None)
            }
            AppError::BadGateway(msg) => {
                tracing::error!(detail = %msg, "Upstream failure");
                ("BAD_GATEWAY", "Upstream service failure".to_string(), None)
            }
            AppError::ServiceUnavailable => (
                "SERVICE_UNAVAILABLE",
                "Service unavailable".to_string(),
                None,
            ),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                ("DATABASE_ERROR", "Database error".to_string(), None)
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                ("CONFIG_ERROR", "Configuration error".to_string(), None)
            }
            AppError::Domain { code, message, .. } => (code, message, None),
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error_code: error_code.to_string(),
                message,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_rendered() {
        let err = AppError::DatabaseError(anyhow::anyhow!("connection refused at 10.0.0.4"));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn domain_error_keeps_status_and_code() {
        let err = AppError::domain(StatusCode::PAYMENT_REQUIRED, "PAYMENT_REQUIRED", "pay first");
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.to_string(), "PAYMENT_REQUIRED: pay first");
    }

    #[test]
    fn too_many_requests_sets_retry_after() {
        let res = AppError::TooManyRequests("slow down".to_string(), Some(12)).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "12"
        );
    }
}
