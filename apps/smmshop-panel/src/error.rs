use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use smmshop_shared::api::ErrorBody;
use thiserror::Error;
use tracing::error;

use crate::provider::ProviderError;

/// Failure of a shop operation, mapped onto an HTTP status by the handlers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        StoreError::NotFound(format!("{} not found", what))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StoreError::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Validation(_) | StoreError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            StoreError::Provider(_) => StatusCode::BAD_GATEWAY,
            StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Internal(e.into())
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            StoreError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(StoreError::not_found("Order 5").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            StoreError::InsufficientFunds { needed: 10, available: 1 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(StoreError::conflict("busy").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            StoreError::Unauthorized("bad init data".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StoreError::from(ProviderError::Api("bad key".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            StoreError::from(anyhow::anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let response = StoreError::from(anyhow::anyhow!("secret path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
