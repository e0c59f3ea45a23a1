// src/repositories/mod.rs

//! Persistence ports and their in-memory and PostgreSQL implementations.
//!
//! `save` is always an upsert: update when a record with the same id exists,
//! insert otherwise.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::ServiceError,
    models::{
        author::{Author, AuthorId},
        quiz::{Quiz, QuizFilter, QuizId},
        submission::{Submission, SubmissionId},
    },
};

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get(&self, id: QuizId) -> Result<Quiz, ServiceError>;
    async fn save(&self, quiz: &Quiz) -> Result<(), ServiceError>;
    async fn list(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, ServiceError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn get(&self, id: SubmissionId) -> Result<Submission, ServiceError>;
    async fn save(&self, submission: &Submission) -> Result<(), ServiceError>;
    async fn by_author(&self, author_id: AuthorId) -> Result<Vec<Submission>, ServiceError>;
    async fn by_quiz(
        &self,
        quiz_id: QuizId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Submission>, ServiceError>;
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn get(&self, id: AuthorId) -> Result<Author, ServiceError>;
    async fn by_email(&self, email: &str) -> Result<Author, ServiceError>;
    async fn save(&self, author: &Author) -> Result<(), ServiceError>;
}

/// Converts a 1-based page into `(offset, limit)`. Page 0 is treated as page 1.
pub fn page_bounds(page: u32, page_size: u32) -> (usize, usize) {
    let page = page.max(1) as usize;
    let page_size = page_size as usize;
    ((page - 1) * page_size, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_one_based() {
        assert_eq!(page_bounds(1, 10), (0, 10));
        assert_eq!(page_bounds(3, 25), (50, 25));
        assert_eq!(page_bounds(0, 10), (0, 10));
    }
}
