use std::time::Duration;

use async_trait::async_trait;

use crate::{
    Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, NewOrder, Order, OrderChanges, OrderId,
    Result,
};

/// Stock ledger operations, scoped to an open transaction.
#[async_trait]
pub trait StockLedger: Send {
    /// Takes an exclusive lock on the book's stock row and returns the stock.
    ///
    /// The lock is held until the enclosing transaction commits or rolls
    /// back. Other transactions locking the same book block until then.
    /// Fails with `NotFound` if the book does not exist.
    async fn lock_and_read_stock(&mut self, book_id: BookId) -> Result<i32>;

    /// Reduces the book's stock by `amount`.
    ///
    /// The row must have been locked by this transaction first, otherwise
    /// `RowNotLocked` is returned. The caller checks `amount` against the
    /// stock it read.
    async fn decrement_stock(&mut self, book_id: BookId, amount: i32) -> Result<()>;

    /// Bounds how long later lock waits of this transaction may block.
    ///
    /// An expired wait is reported as `LockTimeout` and leaves the
    /// transaction able to roll back at once. Stores whose lock waits are
    /// plain in-process futures keep the default, which does nothing.
    async fn limit_lock_wait(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Order record operations, scoped to an open transaction.
#[async_trait]
pub trait OrderStore: Send {
    /// Inserts the order and returns its generated identifier.
    ///
    /// `IdentityRetrieval` is returned when the row was written but its
    /// identifier could not be read back.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId>;
}

/// An open unit of work. Dropping it without commit rolls it back.
#[async_trait]
pub trait StoreTransaction: StockLedger + OrderStore {
    /// Makes every write of this transaction durable and releases its locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction and releases its locks.
    async fn rollback(self) -> Result<()>;
}

/// A store able to open transactions.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type Transaction: StoreTransaction + 'static;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// Author persistence.
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create_author(&self, draft: AuthorDraft) -> Result<Author>;

    async fn list_authors(&self) -> Result<Vec<Author>>;

    async fn get_author(&self, id: AuthorId) -> Result<Option<Author>>;

    /// Replaces the author's fields. Fails with `NotFound` if missing.
    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author>;

    /// Deletes and returns the author.
    ///
    /// Fails with `ForeignKeyViolation` while books reference the author.
    async fn delete_author(&self, id: AuthorId) -> Result<Author>;
}

/// Book persistence outside order placement.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Fails with `ForeignKeyViolation` if the author does not exist.
    async fn create_book(&self, draft: BookDraft) -> Result<Book>;

    async fn list_books(&self) -> Result<Vec<Book>>;

    async fn get_book(&self, id: BookId) -> Result<Option<Book>>;

    /// Replaces the book's fields, including its stock.
    ///
    /// Waits for the book's row lock, so it never interleaves with an
    /// in-flight order placement on the same book.
    async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<Book>;

    /// Deletes and returns the book.
    ///
    /// Fails with `ForeignKeyViolation` while orders reference the book.
    async fn delete_book(&self, id: BookId) -> Result<Book>;
}

/// Order persistence outside order placement.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_orders(&self) -> Result<Vec<Order>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Replaces the order's fields. Stock is not touched.
    async fn update_order(&self, id: OrderId, changes: OrderChanges) -> Result<Order>;

    async fn delete_order(&self, id: OrderId) -> Result<Order>;
}

/// Everything the bookstore backend needs from a store.
pub trait Bookstore:
    TransactionalStore + AuthorRepository + BookRepository + OrderRepository + Clone + 'static
{
}

impl<T> Bookstore for T where
    T: TransactionalStore + AuthorRepository + BookRepository + OrderRepository + Clone + 'static
{
}
