use thiserror::Error;

use crate::BookId;

/// Errors reported by the persistence boundary.
///
/// Driver errors are classified into portable variants here so that callers
/// never inspect engine-specific error codes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A stock write was attempted on a row this transaction has not locked.
    #[error("Stock row for book {0} is not locked by this transaction")]
    RowNotLocked(BookId),

    /// A referenced row does not exist, or a referencing row blocks a delete.
    #[error("Foreign key violation{}", .constraint.as_deref().map(|c| format!(" on {c}")).unwrap_or_default())]
    ForeignKeyViolation { constraint: Option<String> },

    /// A unique constraint rejected a write.
    #[error("Unique violation{}", .constraint.as_deref().map(|c| format!(" on {c}")).unwrap_or_default())]
    UniqueViolation { constraint: Option<String> },

    /// A check constraint (such as non-negative stock) rejected a write.
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Waiting for a row lock exceeded the store's lock timeout.
    #[error("Timed out waiting for row lock")]
    LockTimeout,

    /// A row was inserted but its generated identifier could not be read.
    #[error("Failed to retrieve generated identifier: {0}")]
    IdentityRetrieval(String),

    /// The store could not perform the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn book_not_found(id: BookId) -> Self {
        Self::NotFound {
            entity: "book",
            id: id.as_i64(),
        }
    }

    /// Returns true if the error reports a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation {
                    constraint: db_err.constraint().map(str::to_owned),
                };
            }
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_owned),
                };
            }
            if db_err.is_check_violation() {
                return StoreError::CheckViolation(db_err.message().to_owned());
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
