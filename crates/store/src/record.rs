use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorId, BookId, OrderId, UserId};

/// A stored author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub nationality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable author fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDraft {
    pub name: String,
    #[serde(default)]
    pub nationality: String,
}

/// A stored book.
///
/// `stock` is the book's stock ledger entry. It is never negative in a
/// committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author_id: AuthorId,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable book fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub author_id: AuthorId,
    pub stock: i32,
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub quantity: i32,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of an order about to be inserted by order placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub book_id: BookId,
    pub user_id: UserId,
    pub quantity: i32,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
}

impl NewOrder {
    /// Completes the order with its generated identifier.
    ///
    /// A freshly placed order has `updated_at == ordered_at`.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            book_id: self.book_id,
            user_id: self.user_id,
            quantity: self.quantity,
            status: self.status,
            ordered_at: self.ordered_at,
            updated_at: self.ordered_at,
        }
    }
}

/// Replacement fields for an existing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChanges {
    pub book_id: BookId,
    pub user_id: UserId,
    pub quantity: i32,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl OrderChanges {
    pub(crate) fn apply_to(self, order: &mut Order) {
        order.book_id = self.book_id;
        order.user_id = self.user_id;
        order.quantity = self.quantity;
        order.status = self.status;
        order.updated_at = self.updated_at;
    }
}
