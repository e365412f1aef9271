//! Order service providing placement and record management.

use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use store::{Order, OrderRepository, StoreError, TransactionalStore};

use crate::error::DomainError;
use crate::validation;

use super::{OrderFulfillment, PlaceOrder, PlaceOrderError, UpdateOrder};

/// Service for managing orders.
///
/// Placement goes through [`OrderFulfillment`]. The remaining operations are
/// plain record management and never adjust stock.
pub struct OrderService<S: TransactionalStore + OrderRepository> {
    fulfillment: OrderFulfillment<S>,
}

impl<S: TransactionalStore + OrderRepository> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            fulfillment: OrderFulfillment::new(store),
        }
    }

    /// Bounds how long a placement waits for a stock row lock.
    pub fn with_lock_timeout(self, timeout: Duration) -> Self {
        Self {
            fulfillment: self.fulfillment.with_lock_timeout(timeout),
        }
    }

    /// Returns a reference to the fulfillment coordinator.
    pub fn fulfillment(&self) -> &OrderFulfillment<S> {
        &self.fulfillment
    }

    fn store(&self) -> &S {
        self.fulfillment.store()
    }

    /// Places a new order.
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, PlaceOrderError> {
        self.fulfillment.place_order(cmd).await
    }

    /// Lists every order.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        Ok(self.store().list_orders().await?)
    }

    /// Fetches one order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, DomainError> {
        validation::positive_id("order_id", id.as_i64())?;

        self.store()
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id.as_i64()))
    }

    /// Replaces an order's fields.
    ///
    /// The quantity is not checked against stock and stock is not adjusted.
    #[tracing::instrument(skip(self))]
    pub async fn update_order(&self, cmd: UpdateOrder) -> Result<Order, DomainError> {
        let book_id = cmd.book_id;
        let (id, changes) = cmd.validate_at(Utc::now())?;

        self.store()
            .update_order(id, changes)
            .await
            .map_err(|err| match err {
                StoreError::ForeignKeyViolation { .. } => {
                    DomainError::InvalidReference(format!("Book {book_id} does not exist"))
                }
                other => other.into(),
            })
    }

    /// Deletes an order and returns it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<Order, DomainError> {
        validation::positive_id("order_id", id.as_i64())?;

        Ok(self.store().delete_order(id).await?)
    }
}
