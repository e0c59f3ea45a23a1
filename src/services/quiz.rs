// src/services/quiz.rs

use std::sync::Arc;

use crate::{
    error::ServiceError,
    models::{
        author::Author,
        question::Question,
        quiz::{Quiz, QuizFilter, QuizId, QuizStatus},
        submission::Submission,
    },
    repositories::{QuizRepository, SubmissionRepository},
    transaction::{IsolationLevel, RetryParams, TransactionManager, transactional},
};

/// Loads a quiz only if `author` owns it. Others get `NotFound`.
async fn owned_quiz(
    quizzes: &dyn QuizRepository,
    author: &Author,
    id: QuizId,
) -> Result<Quiz, ServiceError> {
    let quiz = quizzes.get(id).await?;
    if !quiz.is_owned_by(author.id) {
        return Err(ServiceError::not_found(format!("Quiz {}", id)));
    }
    Ok(quiz)
}

pub struct QuizService {
    manager: Arc<dyn TransactionManager>,
    retry: RetryParams,
    quizzes: Arc<dyn QuizRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl QuizService {
    pub fn new(
        manager: Arc<dyn TransactionManager>,
        retry: RetryParams,
        quizzes: Arc<dyn QuizRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            manager,
            retry,
            quizzes,
            submissions,
        }
    }

    /// Creates an empty draft owned by `author`.
    pub async fn create(&self, author: &Author, title: &str) -> Result<Quiz, ServiceError> {
        let quiz = Quiz::new(title, author.id);

        let quizzes = &self.quizzes;
        let draft = &quiz;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { quizzes.save(draft).await },
        )
        .await?;

        tracing::info!(quiz_id = %quiz.id(), author_id = %author.id, "Quiz created");
        Ok(quiz)
    }

    /// Fetches a quiz as seen by `author`.
    ///
    /// Other authors' drafts do not exist for them, and other authors'
    /// published quizzes come back with the correct options hidden.
    pub async fn get(&self, author: &Author, id: QuizId) -> Result<Quiz, ServiceError> {
        let quizzes = &self.quizzes;
        let mut quiz = transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { quizzes.get(id).await },
        )
        .await?;

        if !quiz.is_owned_by(author.id) {
            if !quiz.is_published() {
                return Err(ServiceError::not_found(format!("Quiz {}", id)));
            }
            quiz.hide_correct_answers();
        }
        Ok(quiz)
    }

    /// Lists quizzes. Anything but a search for published quizzes is limited
    /// to the author's own quizzes.
    pub async fn list(&self, author: &Author, filter: QuizFilter) -> Result<Vec<Quiz>, ServiceError> {
        let filter = if filter.status == Some(QuizStatus::Published) {
            filter
        } else {
            QuizFilter {
                author_id: Some(author.id),
                ..filter
            }
        };

        let quizzes = &self.quizzes;
        let criteria = &filter;
        let mut found = transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { quizzes.list(criteria).await },
        )
        .await?;

        found
            .iter_mut()
            .filter(|quiz| !quiz.is_owned_by(author.id))
            .for_each(Quiz::hide_correct_answers);
        Ok(found)
    }

    /// Replaces the title and questions of one of the author's drafts.
    pub async fn edit(
        &self,
        author: &Author,
        id: QuizId,
        title: &str,
        questions: Vec<Question>,
    ) -> Result<Quiz, ServiceError> {
        let quizzes = &self.quizzes;
        let questions = &questions;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::Serializable,
            &self.retry,
            move || async move {
                let mut quiz = owned_quiz(quizzes.as_ref(), author, id).await?;
                quiz.set_title(title);
                quiz.set_questions(questions.clone())?;
                quizzes.save(&quiz).await?;
                Ok(quiz)
            },
        )
        .await
    }

    pub async fn publish(&self, author: &Author, id: QuizId) -> Result<Quiz, ServiceError> {
        let quizzes = &self.quizzes;
        let quiz = transactional(
            self.manager.as_ref(),
            IsolationLevel::Serializable,
            &self.retry,
            move || async move {
                let mut quiz = owned_quiz(quizzes.as_ref(), author, id).await?;
                quiz.publish()?;
                quizzes.save(&quiz).await?;
                Ok(quiz)
            },
        )
        .await?;

        tracing::info!(quiz_id = %id, "Quiz published");
        Ok(quiz)
    }

    /// Submissions made to one of the author's quizzes, one page at a time.
    pub async fn submissions(
        &self,
        author: &Author,
        id: QuizId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Submission>, ServiceError> {
        let quizzes = &self.quizzes;
        let submissions = &self.submissions;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move {
                owned_quiz(quizzes.as_ref(), author, id).await?;
                submissions.by_quiz(id, page, page_size).await
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::author::AuthorId, repositories::memory::InMemoryStore, services::Services};

    fn setup() -> (Services, Author, Author) {
        let services = Services::in_memory(&InMemoryStore::new(), RetryParams::default());
        (services, author("owner@example.com"), author("other@example.com"))
    }

    fn author(email: &str) -> Author {
        Author {
            id: AuthorId::new(),
            email: email.to_string(),
            hashed_password: String::new(),
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::new("2 + 2?", ["3", "4"], ["4"]).unwrap(),
            Question::new("Primes?", ["2", "3", "4"], ["2", "3"]).unwrap(),
        ]
    }

    #[tokio::test]
    async fn drafts_are_private_to_their_owner() {
        let (services, owner, other) = setup();
        let quiz = services.quizzes.create(&owner, "Math").await.unwrap();

        assert_eq!(services.quizzes.get(&owner, quiz.id()).await.unwrap().title(), "Math");
        assert!(matches!(
            services.quizzes.get(&other, quiz.id()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn edit_and_publish_by_owner() {
        let (services, owner, _) = setup();
        let quiz = services.quizzes.create(&owner, "Math").await.unwrap();

        let edited = services
            .quizzes
            .edit(&owner, quiz.id(), "Arithmetic", questions())
            .await
            .unwrap();
        assert_eq!(edited.title(), "Arithmetic");
        assert_eq!(edited.questions().len(), 2);

        let published = services.quizzes.publish(&owner, quiz.id()).await.unwrap();
        assert!(published.is_published());

        assert!(matches!(
            services.quizzes.edit(&owner, quiz.id(), "Again", questions()).await,
            Err(ServiceError::QuizValidation(_))
        ));
        assert!(matches!(
            services.quizzes.publish(&owner, quiz.id()).await,
            Err(ServiceError::QuizValidation(_))
        ));
    }

    #[tokio::test]
    async fn non_owner_cannot_edit_publish_or_read_submissions() {
        let (services, owner, other) = setup();
        let quiz = services.quizzes.create(&owner, "Math").await.unwrap();

        assert!(matches!(
            services.quizzes.edit(&other, quiz.id(), "Mine", questions()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.quizzes.publish(&other, quiz.id()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.quizzes.submissions(&other, quiz.id(), 1, 10).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn publishing_without_questions_fails() {
        let (services, owner, _) = setup();
        let quiz = services.quizzes.create(&owner, "Empty").await.unwrap();

        assert!(matches!(
            services.quizzes.publish(&owner, quiz.id()).await,
            Err(ServiceError::QuizValidation(_))
        ));
    }

    #[tokio::test]
    async fn other_authors_see_published_quizzes_redacted() {
        let (services, owner, other) = setup();
        let quiz = services.quizzes.create(&owner, "Math").await.unwrap();
        services.quizzes.edit(&owner, quiz.id(), "Math", questions()).await.unwrap();
        services.quizzes.publish(&owner, quiz.id()).await.unwrap();

        let seen = services.quizzes.get(&other, quiz.id()).await.unwrap();
        assert!(seen.questions().iter().all(|q| q.visible_correct_options().is_empty()));

        let own = services.quizzes.get(&owner, quiz.id()).await.unwrap();
        assert!(own.questions().iter().all(|q| !q.visible_correct_options().is_empty()));
    }

    #[tokio::test]
    async fn list_scopes_to_own_quizzes_unless_searching_published() {
        let (services, owner, other) = setup();
        let quiz = services.quizzes.create(&owner, "Math").await.unwrap();
        services.quizzes.edit(&owner, quiz.id(), "Math", questions()).await.unwrap();
        services.quizzes.publish(&owner, quiz.id()).await.unwrap();
        services.quizzes.create(&owner, "Draft").await.unwrap();
        services.quizzes.create(&other, "Theirs").await.unwrap();

        let own = services.quizzes.list(&owner, QuizFilter::default()).await.unwrap();
        assert_eq!(own.len(), 2);

        let published = QuizFilter {
            status: Some(QuizStatus::Published),
            ..QuizFilter::default()
        };
        let visible = services.quizzes.list(&other, published).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].questions().iter().all(|q| q.answers_hidden()));
    }
}
