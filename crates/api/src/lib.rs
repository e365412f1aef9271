//! HTTP API server with observability for the bookstore backend.
//!
//! Provides REST endpoints for authors, books and orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use domain::{AuthorService, BookService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Bookstore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Bookstore>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/authors",
            get(routes::authors::list::<S>).post(routes::authors::create::<S>),
        )
        .route(
            "/authors/{id}",
            get(routes::authors::get::<S>)
                .put(routes::authors::update::<S>)
                .delete(routes::authors::delete::<S>),
        )
        .route(
            "/books",
            get(routes::books::list::<S>).post(routes::books::create::<S>),
        )
        .route(
            "/books/{id}",
            get(routes::books::get::<S>)
                .put(routes::books::update::<S>)
                .delete(routes::books::delete::<S>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>)
                .put(routes::orders::update::<S>)
                .delete(routes::orders::delete::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a single store.
///
/// `lock_timeout` bounds how long an order placement waits for a book's
/// stock lock; None waits indefinitely.
pub fn create_default_state<S: Bookstore>(
    store: S,
    lock_timeout: Option<Duration>,
) -> Arc<AppState<S>> {
    let mut orders = OrderService::new(store.clone());
    if let Some(timeout) = lock_timeout {
        orders = orders.with_lock_timeout(timeout);
    }

    Arc::new(AppState {
        authors: AuthorService::new(store.clone()),
        books: BookService::new(store),
        orders,
    })
}
