//! Order commands.

use chrono::{DateTime, Utc};
use common::{BookId, OrderId, UserId};
use store::{NewOrder, OrderChanges};

use crate::validation::{self, ValidationError};

/// Request to place a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    /// The book being ordered.
    pub book_id: BookId,

    /// The user placing the order.
    pub user_id: UserId,

    /// Number of copies requested.
    pub quantity: i32,

    /// Free-form status label stored with the order.
    pub status: String,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        book_id: BookId,
        user_id: UserId,
        quantity: i32,
        status: impl Into<String>,
    ) -> Self {
        Self {
            book_id,
            user_id,
            quantity,
            status: status.into(),
        }
    }

    /// Validates the command and stamps its placement time.
    pub fn validate(self) -> Result<ValidatedPlaceOrder, ValidationError> {
        self.validate_at(Utc::now())
    }

    /// Validates the command using `now` as its placement time.
    pub fn validate_at(self, now: DateTime<Utc>) -> Result<ValidatedPlaceOrder, ValidationError> {
        validation::positive_id("book_id", self.book_id.as_i64())?;
        validation::positive_id("user_id", self.user_id.as_i64())?;
        validation::positive_quantity(self.quantity)?;
        validation::required_text("status", &self.status)?;

        Ok(ValidatedPlaceOrder {
            book_id: self.book_id,
            user_id: self.user_id,
            quantity: self.quantity,
            status: self.status,
            ordered_at: now,
        })
    }
}

/// A `PlaceOrder` that passed validation.
///
/// Only obtainable through [`PlaceOrder::validate`], so holding one proves
/// the fields are in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPlaceOrder {
    book_id: BookId,
    user_id: UserId,
    quantity: i32,
    status: String,
    ordered_at: DateTime<Utc>,
}

impl ValidatedPlaceOrder {
    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.ordered_at
    }

    pub(crate) fn into_new_order(self) -> NewOrder {
        NewOrder {
            book_id: self.book_id,
            user_id: self.user_id,
            quantity: self.quantity,
            status: self.status,
            ordered_at: self.ordered_at,
        }
    }
}

/// Request to replace the fields of an existing order.
///
/// Updating an order never touches stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOrder {
    pub order_id: OrderId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub quantity: i32,
    pub status: String,
}

impl UpdateOrder {
    pub(crate) fn validate_at(
        self,
        now: DateTime<Utc>,
    ) -> Result<(OrderId, OrderChanges), ValidationError> {
        validation::positive_id("order_id", self.order_id.as_i64())?;
        validation::positive_id("book_id", self.book_id.as_i64())?;
        validation::positive_id("user_id", self.user_id.as_i64())?;
        validation::positive_quantity(self.quantity)?;
        validation::required_text("status", &self.status)?;

        Ok((
            self.order_id,
            OrderChanges {
                book_id: self.book_id,
                user_id: self.user_id,
                quantity: self.quantity,
                status: self.status,
                updated_at: now,
            },
        ))
    }
}
