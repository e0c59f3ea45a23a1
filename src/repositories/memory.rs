// src/repositories/memory.rs

//! Single-process repositories for tests and `STORAGE=memory` runs.
//!
//! Uniqueness rules that PostgreSQL enforces with constraints (author email,
//! one submission per quiz and author) are checked on `save` as well.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;

use super::{AuthorRepository, QuizRepository, SubmissionRepository, page_bounds};
use crate::{
    error::ServiceError,
    models::{
        author::{Author, AuthorId},
        quiz::{Quiz, QuizFilter, QuizId},
        submission::{Submission, SubmissionId},
    },
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared tables; clones point at the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    authors: Arc<RwLock<HashMap<AuthorId, Author>>>,
    quizzes: Arc<RwLock<HashMap<QuizId, Quiz>>>,
    submissions: Arc<RwLock<Vec<Submission>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authors(&self) -> InMemoryAuthorRepository {
        InMemoryAuthorRepository {
            authors: Arc::clone(&self.authors),
        }
    }

    pub fn quizzes(&self) -> InMemoryQuizRepository {
        InMemoryQuizRepository {
            quizzes: Arc::clone(&self.quizzes),
        }
    }

    pub fn submissions(&self) -> InMemorySubmissionRepository {
        InMemorySubmissionRepository {
            submissions: Arc::clone(&self.submissions),
        }
    }
}

pub struct InMemoryQuizRepository {
    quizzes: Arc<RwLock<HashMap<QuizId, Quiz>>>,
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn get(&self, id: QuizId) -> Result<Quiz, ServiceError> {
        read(&self.quizzes)
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Quiz {}", id)))
    }

    async fn save(&self, quiz: &Quiz) -> Result<(), ServiceError> {
        write(&self.quizzes).insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn list(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, ServiceError> {
        let mut matching: Vec<Quiz> = read(&self.quizzes)
            .values()
            .filter(|q| filter.status.is_none_or(|s| q.status() == s))
            .filter(|q| filter.author_id.is_none_or(|a| q.author_id() == a))
            .cloned()
            .collect();
        matching.sort_by_key(|q| (q.created_at(), q.id().0));

        let (offset, limit) = page_bounds(filter.page, filter.page_size);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

pub struct InMemorySubmissionRepository {
    submissions: Arc<RwLock<Vec<Submission>>>,
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn get(&self, id: SubmissionId) -> Result<Submission, ServiceError> {
        read(&self.submissions)
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Submission {}", id)))
    }

    async fn save(&self, submission: &Submission) -> Result<(), ServiceError> {
        let mut submissions = write(&self.submissions);

        let duplicate = submissions.iter().any(|s| {
            s.id() != submission.id()
                && s.quiz_id() == submission.quiz_id()
                && s.author_id() == submission.author_id()
        });
        if duplicate {
            return Err(ServiceError::SubmissionValidation(vec![format!(
                "Author {} already has a submission for quiz {}",
                submission.author_id(),
                submission.quiz_id()
            )]));
        }

        match submissions.iter_mut().find(|s| s.id() == submission.id()) {
            Some(existing) => *existing = submission.clone(),
            None => submissions.push(submission.clone()),
        }
        Ok(())
    }

    async fn by_author(&self, author_id: AuthorId) -> Result<Vec<Submission>, ServiceError> {
        Ok(read(&self.submissions)
            .iter()
            .filter(|s| s.author_id() == author_id)
            .cloned()
            .collect())
    }

    async fn by_quiz(
        &self,
        quiz_id: QuizId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Submission>, ServiceError> {
        let (offset, limit) = page_bounds(page, page_size);
        Ok(read(&self.submissions)
            .iter()
            .filter(|s| s.quiz_id() == quiz_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

pub struct InMemoryAuthorRepository {
    authors: Arc<RwLock<HashMap<AuthorId, Author>>>,
}

#[async_trait]
impl AuthorRepository for InMemoryAuthorRepository {
    async fn get(&self, id: AuthorId) -> Result<Author, ServiceError> {
        read(&self.authors)
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Author {}", id)))
    }

    async fn by_email(&self, email: &str) -> Result<Author, ServiceError> {
        read(&self.authors)
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Author with email {}", email)))
    }

    async fn save(&self, author: &Author) -> Result<(), ServiceError> {
        let mut authors = write(&self.authors);
        if authors
            .values()
            .any(|a| a.id != author.id && a.email == author.email)
        {
            return Err(ServiceError::AuthorExists(format!(
                "Author with email '{}' already exists",
                author.email
            )));
        }
        authors.insert(author.id, author.clone());
        Ok(())
    }
}
