//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during catalog and order record operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request was rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The addressed record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The request conflicts with existing records.
    #[error("{0}")]
    Conflict(String),

    /// The request references a record that does not exist.
    #[error("{0}")]
    InvalidReference(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Store(other),
        }
    }
}
