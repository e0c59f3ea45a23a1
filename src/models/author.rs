// src/models/author.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::ServiceError,
    utils::hash::{hash_password, verify_password},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub Uuid);

impl AuthorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuthorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anyone who writes quizzes or takes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: AuthorId,

    /// Unique login name.
    pub email: String,

    /// Argon2 PHC string, never serialized.
    pub hashed_password: String,
}

impl Author {
    /// Creates an author with a fresh id and a salted hash of `password`.
    pub fn new(email: &str, password: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            id: AuthorId::new(),
            email: email.to_string(),
            hashed_password: hash_password(password)?,
        })
    }

    pub fn verify_password(&self, plain_password: &str) -> Result<bool, ServiceError> {
        verify_password(plain_password, &self.hashed_password)
    }
}

/// DTO for signing up and logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// Public view of an author.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub id: AuthorId,
    pub email: String,
}

impl From<&Author> for AuthorResponse {
    fn from(author: &Author) -> Self {
        Self {
            id: author.id,
            email: author.email.clone(),
        }
    }
}
