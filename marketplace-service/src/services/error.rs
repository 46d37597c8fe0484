use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Identity provider rejected the session")]
    UpstreamAuthFailure,

    #[error("Invalid institutional email")]
    InvalidEmailFormat,

    #[error("Invalid phone number")]
    InvalidPhoneFormat,

    #[error("{0} is required for this role")]
    MissingRoleField(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Identity already registered")]
    DuplicateIdentity,

    #[error("Profile incomplete")]
    ProfileIncomplete,

    #[error("Payment gateway error: {0}")]
    PaymentGatewayError(String),

    #[error("Payment verification failed")]
    PaymentVerificationFailed,

    #[error("No valid listing entitlement")]
    NoValidEntitlement,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable code rendered as `errorCode`.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated => "UNAUTHENTICATED",
            ServiceError::UpstreamAuthFailure => "UPSTREAM_AUTH_FAILURE",
            ServiceError::InvalidEmailFormat => "INVALID_EMAIL_FORMAT",
            ServiceError::InvalidPhoneFormat => "INVALID_PHONE_FORMAT",
            ServiceError::MissingRoleField(_) => "MISSING_ROLE_FIELD",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::DuplicateIdentity => "DUPLICATE_IDENTITY",
            ServiceError::ProfileIncomplete => "PROFILE_INCOMPLETE",
            ServiceError::PaymentGatewayError(_) => "PAYMENT_GATEWAY_ERROR",
            ServiceError::PaymentVerificationFailed => "PAYMENT_VERIFICATION_FAILED",
            ServiceError::NoValidEntitlement => "PAYMENT_REQUIRED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        ServiceError::Database(anyhow::Error::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for ServiceError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ServiceError::Internal(anyhow::Error::new(err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::PaymentGatewayError(detail) => {
                tracing::error!(detail = %detail, "Payment gateway failure");
                AppError::domain(
                    StatusCode::BAD_GATEWAY,
                    code,
                    "Payment gateway unavailable, please retry",
                )
            }
            ServiceError::Unauthenticated | ServiceError::UpstreamAuthFailure => {
                AppError::domain(StatusCode::UNAUTHORIZED, code, err.to_string())
            }
            ServiceError::NoValidEntitlement => AppError::domain(
                StatusCode::PAYMENT_REQUIRED,
                code,
                "Payment required: purchase a listing token first",
            ),
            ServiceError::NotFound(_) => {
                AppError::domain(StatusCode::NOT_FOUND, code, err.to_string())
            }
            ServiceError::InvalidEmailFormat => AppError::domain(
                StatusCode::BAD_REQUEST,
                code,
                "Invalid email: provide only the part before @",
            ),
            ServiceError::ProfileIncomplete => AppError::domain(
                StatusCode::BAD_REQUEST,
                code,
                "Profile incomplete: add a phone number first",
            ),
            ServiceError::InvalidPhoneFormat
            | ServiceError::MissingRoleField(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::DuplicateIdentity
            | ServiceError::PaymentVerificationFailed => {
                AppError::domain(StatusCode::BAD_REQUEST, code, err.to_string())
            }
        }
    }
}
