//! Author endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AuthorId;
use serde::Deserialize;
use store::{Author, AuthorDraft, Bookstore};

use super::{AppState, json_body, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AuthorRequest {
    pub name: String,
    #[serde(default)]
    pub nationality: String,
}

impl From<AuthorRequest> for AuthorDraft {
    fn from(req: AuthorRequest) -> Self {
        AuthorDraft {
            name: req.name,
            nationality: req.nationality,
        }
    }
}

// -- Handlers --

/// POST /authors
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Author>), ApiError> {
    let req = json_body(payload)?;
    let author = state.authors.create_author(req.into()).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// GET /authors
#[tracing::instrument(skip(state))]
pub async fn list<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Author>>, ApiError> {
    Ok(Json(state.authors.list_authors().await?))
}

/// GET /authors/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Author>, ApiError> {
    let id = AuthorId::new(parse_id(&id)?);
    Ok(Json(state.authors.get_author(id).await?))
}

/// PUT /authors/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<Json<Author>, ApiError> {
    let id = AuthorId::new(parse_id(&id)?);
    let req = json_body(payload)?;
    Ok(Json(state.authors.update_author(id, req.into()).await?))
}

/// DELETE /authors/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Bookstore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Author>, ApiError> {
    let id = AuthorId::new(parse_id(&id)?);
    Ok(Json(state.authors.delete_author(id).await?))
}
