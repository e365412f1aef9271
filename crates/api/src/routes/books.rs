//! Book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AuthorId, BookId};
use serde::Deserialize;
use store::{Book, BookDraft, Bookstore};

use super::{AppState, json_body, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct BookRequest {
    pub title: String,
    pub author_id: i64,
    pub stock: i32,
}

impl From<BookRequest> for BookDraft {
    fn from(req: BookRequest) -> Self {
        BookDraft {
            title: req.title,
            author_id: AuthorId::new(req.author_id),
            stock: req.stock,
        }
    }
}

// -- Handlers --

/// POST /books
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let req = json_body(payload)?;
    let book = state.books.create_book(req.into()).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /books
#[tracing::instrument(skip(state))]
pub async fn list<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.books.list_books().await?))
}

/// GET /books/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let id = BookId::new(parse_id(&id)?);
    Ok(Json(state.books.get_book(id).await?))
}

/// PUT /books/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let id = BookId::new(parse_id(&id)?);
    let req = json_body(payload)?;
    Ok(Json(state.books.update_book(id, req.into()).await?))
}

/// DELETE /books/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let id = BookId::new(parse_id(&id)?);
    Ok(Json(state.books.delete_book(id).await?))
}
