use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::ports::{GatewayError, RepositoryError};
use crate::validation::ValidationError;

/// Coarse classification of engine failures, used by callers to decide
/// between blocking, warning and retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-input problem. Never retried, never logged as a system fault.
    Validation,
    /// Refusal with an explanation (funds, floor price, negative net).
    BusinessRule,
    /// Idempotency or concurrent-write conflict.
    Conflict,
    NotFound,
    /// Disbursement or finance-partner failure. The whole step is safe to retry.
    External,
    Internal,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid grading: {0}")]
    InvalidGrading(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown truck tier: {0}")]
    UnknownTier(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: BigDecimal,
        available: BigDecimal,
    },

    #[error("Net amount would be negative: deductions {deductions} exceed base {base}")]
    NegativeNetAmount {
        base: BigDecimal,
        deductions: BigDecimal,
    },

    #[error("Offered price {offered} for {produce_type} is below the floor price {floor_price}")]
    FloorPriceViolation {
        produce_type: String,
        offered: BigDecimal,
        floor_price: BigDecimal,
    },

    #[error("Duplicate deposit for member {member_id} on order {order_id}")]
    DuplicateDeposit { member_id: Uuid, order_id: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Repository(RepositoryError),

    #[error("External collaborator failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Report export failed: {0}")]
    Export(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidGrading(_)
            | EngineError::InvalidAmount(_)
            | EngineError::UnknownTier(_)
            | EngineError::InvalidOrder(_)
            | EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::InsufficientFunds { .. }
            | EngineError::NegativeNetAmount { .. }
            | EngineError::FloorPriceViolation { .. } => ErrorKind::BusinessRule,
            EngineError::DuplicateDeposit { .. } => ErrorKind::Conflict,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            EngineError::Repository(_) | EngineError::Export(_) => ErrorKind::Internal,
            EngineError::Gateway(_) => ErrorKind::External,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Repository(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Unprocessable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    BadGateway(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => AppError::Validation(message),
            ErrorKind::BusinessRule => AppError::Unprocessable(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::External => {
                tracing::error!(error = %message, "External collaborator failure");
                AppError::BadGateway(message)
            }
            ErrorKind::Internal => {
                tracing::error!(error = %message, "Internal failure");
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_engine_error_kinds() {
        assert_eq!(
            EngineError::InvalidGrading("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::UnknownTier("9000-ton".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::InsufficientFunds {
                requested: BigDecimal::from(10),
                available: BigDecimal::from(5),
            }
            .kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(
            EngineError::DuplicateDeposit {
                member_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::Gateway(GatewayError::Rejected("declined".into())).kind(),
            ErrorKind::External
        );
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: EngineError = RepositoryError::NotFound("order 1".into()).into();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err: EngineError = RepositoryError::Conflict("stale balance".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_engine_error_to_app_error_status() {
        let app: AppError = EngineError::FloorPriceViolation {
            produce_type: "maize".into(),
            offered: BigDecimal::from(25),
            floor_price: BigDecimal::from(30),
        }
        .into();
        assert_eq!(app.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let app: AppError = EngineError::NotFound("member".into()).into();
        assert_eq!(app.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conflict_error_response() {
        let error = AppError::Conflict("deposit already posted".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
