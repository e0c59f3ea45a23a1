// src/services/mod.rs

//! Application services. Each public operation runs in its own
//! retrying transaction; see [`crate::transaction::transactional`].

pub mod author;
pub mod quiz;
pub mod submission;

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    repositories::{
        AuthorRepository, QuizRepository, SubmissionRepository,
        memory::InMemoryStore,
        postgres::{PgAuthorRepository, PgQuizRepository, PgSubmissionRepository},
    },
    transaction::{
        RetryParams, TransactionManager, memory::InMemoryTransactionManager,
        postgres::PgTransactionManager,
    },
};

pub use author::AuthorService;
pub use quiz::QuizService;
pub use submission::SubmissionService;

/// One unit of work: the three services sharing a single transaction manager.
///
/// Build a fresh one per request so concurrent requests never share a
/// logical transaction.
pub struct Services {
    pub authors: AuthorService,
    pub quizzes: QuizService,
    pub submissions: SubmissionService,
}

impl Services {
    pub fn postgres(pool: PgPool, retry: RetryParams) -> Self {
        let manager = Arc::new(PgTransactionManager::new(pool));
        Self::assemble(
            manager.clone(),
            retry,
            Arc::new(PgAuthorRepository::new(manager.clone())),
            Arc::new(PgQuizRepository::new(manager.clone())),
            Arc::new(PgSubmissionRepository::new(manager)),
        )
    }

    pub fn in_memory(store: &InMemoryStore, retry: RetryParams) -> Self {
        Self::assemble(
            Arc::new(InMemoryTransactionManager::new()),
            retry,
            Arc::new(store.authors()),
            Arc::new(store.quizzes()),
            Arc::new(store.submissions()),
        )
    }

    fn assemble(
        manager: Arc<dyn TransactionManager>,
        retry: RetryParams,
        authors: Arc<dyn AuthorRepository>,
        quizzes: Arc<dyn QuizRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            authors: AuthorService::new(manager.clone(), retry.clone(), authors),
            quizzes: QuizService::new(
                manager.clone(),
                retry.clone(),
                quizzes.clone(),
                submissions.clone(),
            ),
            submissions: SubmissionService::new(manager, retry, quizzes, submissions),
        }
    }
}
