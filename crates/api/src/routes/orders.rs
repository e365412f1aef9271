//! Order placement and order record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BookId, OrderId, UserId};
use domain::{PlaceOrder, UpdateOrder};
use serde::{Deserialize, Serialize};
use store::{Bookstore, Order};

use super::{AppState, json_body, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct OrderRequest {
    pub book_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    #[serde(default)]
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub message: &'static str,
    pub order: Order,
}

// -- Handlers --

/// POST /orders: places an order, decrementing the book's stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let req = json_body(payload)?;
    let cmd = PlaceOrder::new(
        BookId::new(req.book_id),
        UserId::new(req.user_id),
        req.quantity,
        req.status,
    );

    let order = state.orders.place_order(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            message: "Order created successfully",
            order,
        }),
    ))
}

/// GET /orders
#[tracing::instrument(skip(state))]
pub async fn list<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders().await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = OrderId::new(parse_id(&id)?);
    Ok(Json(state.orders.get_order(id).await?))
}

/// PUT /orders/{id}: replaces an order's fields without touching stock.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId::new(parse_id(&id)?);
    let req = json_body(payload)?;

    let order = state
        .orders
        .update_order(UpdateOrder {
            order_id,
            book_id: BookId::new(req.book_id),
            user_id: UserId::new(req.user_id),
            quantity: req.quantity,
            status: req.status,
        })
        .await?;

    Ok(Json(order))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = OrderId::new(parse_id(&id)?);
    Ok(Json(state.orders.delete_order(id).await?))
}
