//! Persistence layer for the bookstore backend.
//!
//! Exposes the transaction-scoped capability used by order placement
//! (stock ledger and order store operations sharing one transaction) and
//! plain repositories for authors, books and orders. Two implementations
//! are provided: PostgreSQL via `sqlx` and an in-memory store for tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{AuthorId, BookId, OrderId, UserId};
pub use error::{Result, StoreError};
pub use memory::{CallCounts, InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use record::{Author, AuthorDraft, Book, BookDraft, NewOrder, Order, OrderChanges};
pub use store::{
    AuthorRepository, BookRepository, Bookstore, OrderRepository, OrderStore, StockLedger,
    StoreTransaction, TransactionalStore,
};
