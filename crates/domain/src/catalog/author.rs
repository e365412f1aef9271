use common::AuthorId;
use store::{Author, AuthorDraft, AuthorRepository, StoreError};

use crate::error::DomainError;
use crate::validation;

/// Service for managing authors.
///
/// Author names are unique, compared case-insensitively.
pub struct AuthorService<R: AuthorRepository> {
    repo: R,
}

impl<R: AuthorRepository> AuthorService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_author(&self, draft: AuthorDraft) -> Result<Author, DomainError> {
        let draft = normalize(draft)?;
        self.ensure_unique_name(&draft.name, None).await?;

        let name = draft.name.clone();
        self.repo
            .create_author(draft)
            .await
            .map_err(|err| duplicate_name(err, &name))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_authors(&self) -> Result<Vec<Author>, DomainError> {
        Ok(self.repo.list_authors().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_author(&self, id: AuthorId) -> Result<Author, DomainError> {
        validation::positive_id("author_id", id.as_i64())?;

        self.repo
            .get_author(id)
            .await?
            .ok_or_else(|| DomainError::not_found("author", id.as_i64()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_author(
        &self,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<Author, DomainError> {
        validation::positive_id("author_id", id.as_i64())?;
        let draft = normalize(draft)?;
        self.get_author(id).await?;
        self.ensure_unique_name(&draft.name, Some(id)).await?;

        let name = draft.name.clone();
        self.repo
            .update_author(id, draft)
            .await
            .map_err(|err| duplicate_name(err, &name))
    }

    /// Deletes an author. Fails with `Conflict` while books reference it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_author(&self, id: AuthorId) -> Result<Author, DomainError> {
        validation::positive_id("author_id", id.as_i64())?;

        self.repo.delete_author(id).await.map_err(|err| match err {
            StoreError::ForeignKeyViolation { .. } => DomainError::Conflict(format!(
                "Author {id} cannot be deleted while books reference it"
            )),
            other => other.into(),
        })
    }

    async fn ensure_unique_name(
        &self,
        name: &str,
        except: Option<AuthorId>,
    ) -> Result<(), DomainError> {
        let wanted = name.to_lowercase();
        let taken = self
            .repo
            .list_authors()
            .await?
            .into_iter()
            .any(|author| Some(author.id) != except && author.name.to_lowercase() == wanted);

        if taken {
            return Err(name_taken(name));
        }
        Ok(())
    }
}

fn name_taken(name: &str) -> DomainError {
    DomainError::Conflict(format!("Author with name '{name}' already exists"))
}

/// A concurrent writer can take the name between the check and the write.
fn duplicate_name(err: StoreError, name: &str) -> DomainError {
    match err {
        StoreError::UniqueViolation { .. } => name_taken(name),
        other => other.into(),
    }
}

fn normalize(draft: AuthorDraft) -> Result<AuthorDraft, DomainError> {
    validation::required_text("name", &draft.name)?;

    Ok(AuthorDraft {
        name: draft.name.trim().to_string(),
        nationality: draft.nationality.trim().to_string(),
    })
}
