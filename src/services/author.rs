// src/services/author.rs

use std::sync::Arc;

use crate::{
    error::ServiceError,
    models::author::Author,
    repositories::AuthorRepository,
    transaction::{IsolationLevel, RetryParams, TransactionManager, transactional},
};

pub struct AuthorService {
    manager: Arc<dyn TransactionManager>,
    retry: RetryParams,
    authors: Arc<dyn AuthorRepository>,
}

impl AuthorService {
    pub fn new(
        manager: Arc<dyn TransactionManager>,
        retry: RetryParams,
        authors: Arc<dyn AuthorRepository>,
    ) -> Self {
        Self {
            manager,
            retry,
            authors,
        }
    }

    pub async fn by_email(&self, email: &str) -> Result<Author, ServiceError> {
        let authors = &self.authors;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { authors.by_email(email).await },
        )
        .await
    }

    /// Registers a new author. Fails with `AuthorExists` if the email is taken.
    pub async fn create(&self, email: &str, password: &str) -> Result<Author, ServiceError> {
        // Hash outside the transaction, argon2 is slow on purpose.
        let author = Author::new(email, password)?;

        let authors = &self.authors;
        let new_author = &author;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move {
                match authors.by_email(&new_author.email).await {
                    Ok(_) => Err(ServiceError::AuthorExists(format!(
                        "Author with email '{}' already exists",
                        new_author.email
                    ))),
                    Err(ServiceError::NotFound(_)) => authors.save(new_author).await,
                    Err(other) => Err(other),
                }
            },
        )
        .await?;

        tracing::info!(author_id = %author.id, "Author registered");
        Ok(author)
    }

    /// Resolves credentials to an author. Unknown email and wrong password look the same.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Author, ServiceError> {
        let author = match self.by_email(email).await {
            Ok(author) => author,
            Err(ServiceError::NotFound(_)) => return Err(ServiceError::InvalidCredentials),
            Err(other) => return Err(other),
        };

        if author.verify_password(password)? {
            Ok(author)
        } else {
            Err(ServiceError::InvalidCredentials)
        }
    }
}
