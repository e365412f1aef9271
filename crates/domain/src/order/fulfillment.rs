//! The order fulfillment transaction.
//!
//! Placing an order locks the book's stock row, checks the requested
//! quantity against it, inserts the order and decrements the stock, all in
//! one store transaction. The row lock serializes concurrent placements on
//! the same book, so the sum of committed quantities never exceeds the
//! stock that was available.

use std::time::{Duration, Instant};

use common::BookId;
use store::{Order, OrderStore, StockLedger, StoreError, StoreTransaction, TransactionalStore};

use super::{ErrorClass, PlaceOrder, PlaceOrderError, ValidatedPlaceOrder};

/// Places orders against a transactional store.
pub struct OrderFulfillment<S: TransactionalStore> {
    store: S,
    lock_timeout: Option<Duration>,
}

impl<S: TransactionalStore> OrderFulfillment<S> {
    /// Creates a fulfillment coordinator that waits for stock locks
    /// indefinitely.
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock_timeout: None,
        }
    }

    /// Bounds how long a placement waits for the stock row lock.
    ///
    /// The deadline is handed to the store for every transaction, so a
    /// database wait is cancelled server-side as well. When it passes the
    /// attempt is rolled back and reported as `LockTimeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and places an order.
    ///
    /// Validation failures are returned before any transaction is opened.
    #[tracing::instrument(skip(self), fields(book_id = %cmd.book_id, quantity = cmd.quantity))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, PlaceOrderError> {
        let validated = match cmd.validate() {
            Ok(validated) => validated,
            Err(err) => {
                let err = PlaceOrderError::from(err);
                record_failure(&err);
                return Err(err);
            }
        };

        self.place_validated(validated).await
    }

    /// Places an already validated order.
    ///
    /// On success the returned order carries the identifier generated by the
    /// store and every write is durable. On failure no write of the attempt
    /// is visible to other transactions.
    pub async fn place_validated(
        &self,
        cmd: ValidatedPlaceOrder,
    ) -> Result<Order, PlaceOrderError> {
        let started = Instant::now();
        let result = self.run(cmd).await;
        metrics::histogram!("place_order_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    book_id = %order.book_id,
                    quantity = order.quantity,
                    "Order placed"
                );
            }
            Err(err) => record_failure(err),
        }

        result
    }

    async fn run(&self, cmd: ValidatedPlaceOrder) -> Result<Order, PlaceOrderError> {
        let book_id = cmd.book_id();
        let requested = cmd.quantity();

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(PlaceOrderError::TransactionStart)?;

        let limited = match self.lock_timeout {
            Some(limit) => tx.limit_lock_wait(limit).await,
            None => Ok(()),
        };
        if let Err(source) = limited {
            return Err(abort(tx, PlaceOrderError::TransactionStart(source)).await);
        }

        let available = match self.lock_stock(&mut tx, book_id).await {
            Ok(stock) => stock,
            Err(err) => return Err(abort(tx, err).await),
        };

        if available < requested {
            let err = PlaceOrderError::InsufficientStock {
                book_id,
                requested,
                available,
            };
            return Err(abort(tx, err).await);
        }

        let new_order = cmd.into_new_order();
        let order_id = match tx.insert_order(&new_order).await {
            Ok(id) => id,
            Err(source) => return Err(abort(tx, PlaceOrderError::OrderInsertFailed(source)).await),
        };

        if let Err(source) = tx.decrement_stock(book_id, requested).await {
            let err = PlaceOrderError::StockUpdateFailed { book_id, source };
            return Err(abort(tx, err).await);
        }

        tx.commit().await.map_err(PlaceOrderError::CommitFailed)?;

        Ok(new_order.into_order(order_id))
    }

    async fn lock_stock(
        &self,
        tx: &mut S::Transaction,
        book_id: BookId,
    ) -> Result<i32, PlaceOrderError> {
        let started = Instant::now();
        let lookup = tx.lock_and_read_stock(book_id);

        let result = match self.lock_timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::LockTimeout),
            },
            None => lookup.await,
        };

        metrics::histogram!("stock_lock_wait_seconds").record(started.elapsed().as_secs_f64());

        result.map_err(|source| match source {
            StoreError::LockTimeout => PlaceOrderError::LockTimeout { book_id },
            source => PlaceOrderError::StockLookupFailed { book_id, source },
        })
    }
}

/// Rolls back `tx` and returns the error that caused the abort.
///
/// A rollback failure is logged and otherwise ignored; the store discards
/// the uncommitted writes either way.
async fn abort<T: StoreTransaction>(tx: T, err: PlaceOrderError) -> PlaceOrderError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, cause = %err, "Rollback failed");
    }
    err
}

fn record_failure(err: &PlaceOrderError) {
    metrics::counter!("order_placement_failures_total", "reason" => err.reason()).increment(1);

    match err.class() {
        ErrorClass::Validation | ErrorClass::Business => {
            tracing::warn!(error = %err, "Order rejected");
        }
        ErrorClass::Infrastructure => {
            tracing::error!(error = %err, "Order placement failed");
        }
    }
}
