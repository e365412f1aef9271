//! Route handlers and shared state.

pub mod authors;
pub mod books;
pub mod health;
pub mod metrics;
pub mod orders;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use domain::{AuthorService, BookService, OrderService};
use store::Bookstore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Bookstore> {
    pub authors: AuthorService<S>,
    pub books: BookService<S>,
    pub orders: OrderService<S>,
}

/// Parses a numeric path identifier.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}

/// Unwraps a JSON body, turning extractor rejections into `BadRequest`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(format!("Invalid request body: {rejection}")))
}
