//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorClass, PlaceOrderError};
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed path parameter or request body.
    #[error("{0}")]
    BadRequest(String),

    /// Catalog or order record error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Order placement error.
    #[error(transparent)]
    PlaceOrder(#[from] PlaceOrderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => domain_error_status(err),
            ApiError::PlaceOrder(err) => place_order_error_status(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) | DomainError::InvalidReference(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Store(err) => store_error_status(err),
    }
}

fn place_order_error_status(err: &PlaceOrderError) -> StatusCode {
    match err {
        PlaceOrderError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        PlaceOrderError::InsufficientStock { .. } => StatusCode::CONFLICT,
        PlaceOrderError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PlaceOrderError::OrderInsertFailed(StoreError::ForeignKeyViolation { .. }) => {
            StatusCode::BAD_REQUEST
        }
        err if err.is_book_not_found() => StatusCode::NOT_FOUND,
        err => match err.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::Business => StatusCode::CONFLICT,
            ErrorClass::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::ForeignKeyViolation { .. } | StoreError::CheckViolation(_) => {
            StatusCode::BAD_REQUEST
        }
        StoreError::UniqueViolation { .. } => StatusCode::CONFLICT,
        StoreError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
