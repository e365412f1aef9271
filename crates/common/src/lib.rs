//! Shared types for the bookstore backend.

pub mod types;

pub use types::{AuthorId, BookId, OrderId, UserId};
