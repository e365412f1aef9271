//! Order placement against PostgreSQL.
//!
//! These tests drive `OrderFulfillment` over `PostgresStore` in a shared
//! PostgreSQL container. Each test seeds its own author and book and only
//! inspects rows of that book, so the tests can run in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{BookId, UserId};
use domain::{OrderFulfillment, PlaceOrder, PlaceOrderError};
use sqlx::PgPool;
use store::{
    AuthorDraft, AuthorRepository, BookDraft, BookRepository, OrderRepository, PostgresStore,
    StockLedger, StoreTransaction, TransactionalStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_bookstore_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a store with its own pool. Tables are shared with other tests.
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_book(store: &PostgresStore, author: &str, stock: i32) -> BookId {
    let author = store
        .create_author(AuthorDraft {
            name: author.to_string(),
            nationality: "Vietnamese".to_string(),
        })
        .await
        .unwrap();

    store
        .create_book(BookDraft {
            title: format!("Collected works of {}", author.name),
            author_id: author.id,
            stock,
        })
        .await
        .unwrap()
        .id
}

async fn stock_of(store: &PostgresStore, book_id: BookId) -> i32 {
    store.get_book(book_id).await.unwrap().unwrap().stock
}

async fn orders_for(store: &PostgresStore, book_id: BookId) -> Vec<store::Order> {
    store
        .list_orders()
        .await
        .unwrap()
        .into_iter()
        .filter(|order| order.book_id == book_id)
        .collect()
}

fn order_for(book_id: BookId, quantity: i32) -> PlaceOrder {
    PlaceOrder::new(book_id, UserId::new(11), quantity, "pending")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Nguyen Huy Thiep", 10).await;
    let fulfillment = Arc::new(OrderFulfillment::new(store.clone()));

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let fulfillment = Arc::clone(&fulfillment);
            tokio::spawn(async move { fulfillment.place_order(order_for(book_id, 1)).await })
        })
        .collect();

    let mut placed = 0;
    for result in futures_util::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => assert!(
                matches!(err, PlaceOrderError::InsufficientStock { available: 0, .. }),
                "unexpected error: {err:?}"
            ),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(stock_of(&store, book_id).await, 0);
    assert_eq!(orders_for(&store, book_id).await.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_orders_of_six_against_ten() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Bao Ninh", 10).await;
    let fulfillment = Arc::new(OrderFulfillment::new(store.clone()));

    let first = {
        let fulfillment = Arc::clone(&fulfillment);
        tokio::spawn(async move { fulfillment.place_order(order_for(book_id, 6)).await })
    };
    let second = {
        let fulfillment = Arc::clone(&fulfillment);
        tokio::spawn(async move { fulfillment.place_order(order_for(book_id, 6)).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1);

    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        rejected,
        PlaceOrderError::InsufficientStock {
            requested: 6,
            available: 4,
            ..
        }
    ));

    assert_eq!(stock_of(&store, book_id).await, 4);
    assert_eq!(orders_for(&store, book_id).await.len(), 1);
}

#[tokio::test]
async fn insufficient_stock_leaves_no_order_row() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Ma Van Khang", 2).await;
    let fulfillment = OrderFulfillment::new(store.clone());

    let err = fulfillment
        .place_order(order_for(book_id, 5))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::InsufficientStock { .. }));
    assert_eq!(stock_of(&store, book_id).await, 2);
    assert!(orders_for(&store, book_id).await.is_empty());
}

#[tokio::test]
async fn committed_order_is_durable() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Duong Thu Huong", 10).await;
    let fulfillment = OrderFulfillment::new(store.clone());

    let order = fulfillment.place_order(order_for(book_id, 3)).await.unwrap();

    assert_eq!(stock_of(&store, book_id).await, 7);
    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 3);
    assert_eq!(stored.status, "pending");
}

#[tokio::test]
async fn unknown_book_fails_stock_lookup() {
    let store = get_test_store().await;
    let fulfillment = OrderFulfillment::new(store);

    let err = fulfillment
        .place_order(order_for(BookId::new(i64::MAX), 1))
        .await
        .unwrap_err();

    assert!(err.is_book_not_found());
}

#[tokio::test]
async fn lock_wait_deadline_holds_without_store_timeout() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Nguyen Ngoc Tu", 10).await;

    let mut holder = store.begin().await.unwrap();
    holder.lock_and_read_stock(book_id).await.unwrap();

    // The store itself has no lock timeout configured.
    let fulfillment =
        OrderFulfillment::new(store.clone()).with_lock_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = fulfillment
        .place_order(order_for(book_id, 1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(
        matches!(err, PlaceOrderError::LockTimeout { book_id: b } if b == book_id),
        "unexpected error: {err:?}"
    );
    assert!(
        elapsed < Duration::from_secs(2),
        "waiter returned after {elapsed:?} while the lock was still held"
    );

    holder.rollback().await.unwrap();

    assert_eq!(stock_of(&store, book_id).await, 10);
    assert!(orders_for(&store, book_id).await.is_empty());

    fulfillment.place_order(order_for(book_id, 1)).await.unwrap();
    assert_eq!(stock_of(&store, book_id).await, 9);
}
