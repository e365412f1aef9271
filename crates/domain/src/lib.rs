//! Domain layer for the bookstore backend.
//!
//! This crate provides:
//! - Command validation for order placement and order updates
//! - The order fulfillment transaction, which atomically checks stock,
//!   records the order and decrements stock under a per-book row lock
//! - Catalog services for authors and books

pub mod catalog;
pub mod error;
pub mod order;
pub mod validation;

pub use catalog::{AuthorService, BookService};
pub use error::DomainError;
pub use order::{
    ErrorClass, OrderFulfillment, OrderService, PlaceOrder, PlaceOrderError, UpdateOrder,
    ValidatedPlaceOrder,
};
pub use validation::ValidationError;
