use common::BookId;
use store::{Book, BookDraft, BookRepository, StoreError};

use crate::error::DomainError;
use crate::validation;

/// Service for managing books and their stock levels.
pub struct BookService<R: BookRepository> {
    repo: R,
}

impl<R: BookRepository> BookService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a book. Fails with `InvalidReference` if the author is unknown.
    #[tracing::instrument(skip(self))]
    pub async fn create_book(&self, draft: BookDraft) -> Result<Book, DomainError> {
        let author_id = draft.author_id;
        let draft = validate(draft)?;

        self.repo
            .create_book(draft)
            .await
            .map_err(|err| unknown_author(err, author_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Vec<Book>, DomainError> {
        Ok(self.repo.list_books().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_book(&self, id: BookId) -> Result<Book, DomainError> {
        validation::positive_id("book_id", id.as_i64())?;

        self.repo
            .get_book(id)
            .await?
            .ok_or_else(|| DomainError::not_found("book", id.as_i64()))
    }

    /// Replaces a book's fields, including its stock level.
    #[tracing::instrument(skip(self))]
    pub async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<Book, DomainError> {
        validation::positive_id("book_id", id.as_i64())?;
        let author_id = draft.author_id;
        let draft = validate(draft)?;

        self.repo
            .update_book(id, draft)
            .await
            .map_err(|err| unknown_author(err, author_id))
    }

    /// Deletes a book. Fails with `Conflict` while orders reference it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, id: BookId) -> Result<Book, DomainError> {
        validation::positive_id("book_id", id.as_i64())?;

        self.repo.delete_book(id).await.map_err(|err| match err {
            StoreError::ForeignKeyViolation { .. } => DomainError::Conflict(format!(
                "Book {id} cannot be deleted while orders reference it"
            )),
            other => other.into(),
        })
    }
}

fn validate(draft: BookDraft) -> Result<BookDraft, DomainError> {
    validation::required_text("title", &draft.title)?;
    validation::positive_id("author_id", draft.author_id.as_i64())?;
    validation::non_negative_stock(draft.stock)?;

    Ok(BookDraft {
        title: draft.title.trim().to_string(),
        ..draft
    })
}

fn unknown_author(err: StoreError, author_id: common::AuthorId) -> DomainError {
    match err {
        StoreError::ForeignKeyViolation { .. } => {
            DomainError::InvalidReference(format!("Author {author_id} does not exist"))
        }
        other => other.into(),
    }
}
