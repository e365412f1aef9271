//! Order placement and order record management.

mod commands;
mod fulfillment;
mod service;

pub use commands::{PlaceOrder, UpdateOrder, ValidatedPlaceOrder};
pub use fulfillment::OrderFulfillment;
pub use service::OrderService;

use common::BookId;
use store::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// How a placement failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The command itself was malformed. Retrying it unchanged cannot succeed.
    Validation,
    /// The command was well formed but the current state rejects it.
    Business,
    /// The store failed. The outcome of a retry depends on the store.
    Infrastructure,
}

/// Errors that can occur while placing an order.
///
/// Every variant except `InvalidCommand` is reported with no transaction
/// left open: it was never started, it was rolled back, or its commit
/// failed and the store discarded the writes.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The command failed validation. No transaction was opened.
    #[error("Invalid order command: {0}")]
    InvalidCommand(#[from] ValidationError),

    /// The store could not open a transaction.
    #[error("Failed to begin transaction: {0}")]
    TransactionStart(#[source] StoreError),

    /// The stock row could not be locked or read.
    #[error("Failed to fetch current stock for book {book_id}: {source}")]
    StockLookupFailed {
        book_id: BookId,
        #[source]
        source: StoreError,
    },

    /// The stock row lock was not granted in time.
    #[error("Timed out waiting for stock lock on book {book_id}")]
    LockTimeout { book_id: BookId },

    /// The book does not have enough stock for the requested quantity.
    #[error(
        "Not enough stock available for book {book_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        book_id: BookId,
        requested: i32,
        available: i32,
    },

    /// The order record could not be inserted or its identifier read back.
    #[error("Failed to create order: {0}")]
    OrderInsertFailed(#[source] StoreError),

    /// The stock decrement was rejected.
    #[error("Failed to update stock for book {book_id}: {source}")]
    StockUpdateFailed {
        book_id: BookId,
        #[source]
        source: StoreError,
    },

    /// The commit was rejected. No writes of the attempt are durable.
    #[error("Failed to commit transaction: {0}")]
    CommitFailed(#[source] StoreError),
}

impl PlaceOrderError {
    /// Classifies the failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCommand(_) => ErrorClass::Validation,
            Self::InsufficientStock { .. } => ErrorClass::Business,
            Self::StockLookupFailed { source, .. } if source.is_not_found() => {
                ErrorClass::Business
            }
            _ => ErrorClass::Infrastructure,
        }
    }

    /// Returns true if resubmitting the same command may succeed.
    ///
    /// A failed commit is not retryable: the caller cannot tell from here
    /// whether the store applied the writes before reporting the failure.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure && !matches!(self, Self::CommitFailed(_))
    }

    /// Returns true if the failure reports a book that does not exist.
    pub fn is_book_not_found(&self) -> bool {
        matches!(self, Self::StockLookupFailed { source, .. } if source.is_not_found())
    }

    /// Short label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCommand(_) => "invalid_command",
            Self::TransactionStart(_) => "transaction_start",
            Self::StockLookupFailed { source, .. } if source.is_not_found() => "book_not_found",
            Self::StockLookupFailed { .. } => "stock_lookup",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::OrderInsertFailed(_) => "order_insert",
            Self::StockUpdateFailed { .. } => "stock_update",
            Self::CommitFailed(_) => "commit",
        }
    }
}
