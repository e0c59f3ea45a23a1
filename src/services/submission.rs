// src/services/submission.rs

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    error::ServiceError,
    models::{
        author::Author,
        quiz::QuizId,
        submission::{Submission, SubmissionId},
    },
    repositories::{QuizRepository, SubmissionRepository},
    transaction::{IsolationLevel, RetryParams, TransactionManager, transactional},
};

async fn owned_submission(
    submissions: &dyn SubmissionRepository,
    author: &Author,
    id: SubmissionId,
) -> Result<Submission, ServiceError> {
    let submission = submissions.get(id).await?;
    if submission.author_id() != author.id {
        return Err(ServiceError::not_found(format!("Submission {}", id)));
    }
    Ok(submission)
}

pub struct SubmissionService {
    manager: Arc<dyn TransactionManager>,
    retry: RetryParams,
    quizzes: Arc<dyn QuizRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionService {
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

    pub async fn list(&self, author: &Author) -> Result<Vec<Submission>, ServiceError> {
        let submissions = &self.submissions;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { submissions.by_author(author.id).await },
        )
        .await
    }

    pub async fn get(&self, author: &Author, id: SubmissionId) -> Result<Submission, ServiceError> {
        let submissions = &self.submissions;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::ReadCommitted,
            &self.retry,
            move || async move { owned_submission(submissions.as_ref(), author, id).await },
        )
        .await
    }

    /// Opens the author's only submission for a published quiz.
    pub async fn start(&self, author: &Author, quiz_id: QuizId) -> Result<Submission, ServiceError> {
        let quizzes = &self.quizzes;
        let submissions = &self.submissions;
        let submission = transactional(
            self.manager.as_ref(),
            IsolationLevel::Serializable,
            &self.retry,
            move || async move {
                let quiz = quizzes.get(quiz_id).await?;
                let existing = submissions.by_author(author.id).await?;
                let submission = Submission::start(&quiz, author.id, &existing)?;
                submissions.save(&submission).await?;
                Ok(submission)
            },
        )
        .await?;

        tracing::info!(
            submission_id = %submission.id(),
            quiz_id = %quiz_id,
            author_id = %author.id,
            "Submission started"
        );
        Ok(submission)
    }

    /// Replaces every answer of an in-progress submission.
    pub async fn answer(
        &self,
        author: &Author,
        id: SubmissionId,
        answers: Vec<Option<BTreeSet<String>>>,
    ) -> Result<Submission, ServiceError> {
        let quizzes = &self.quizzes;
        let submissions = &self.submissions;
        let answers = &answers;
        transactional(
            self.manager.as_ref(),
            IsolationLevel::Serializable,
            &self.retry,
            move || async move {
                let mut submission = owned_submission(submissions.as_ref(), author, id).await?;
                let quiz = quizzes.get(submission.quiz_id()).await?;
                submission.answer(&quiz, answers.clone())?;
                submissions.save(&submission).await?;
                Ok(submission)
            },
        )
        .await
    }

    /// Scores the submission and closes it for good.
    pub async fn complete(&self, author: &Author, id: SubmissionId) -> Result<Submission, ServiceError> {
        let quizzes = &self.quizzes;
        let submissions = &self.submissions;
        let submission = transactional(
            self.manager.as_ref(),
            IsolationLevel::Serializable,
            &self.retry,
            move || async move {
                let mut submission = owned_submission(submissions.as_ref(), author, id).await?;
                let quiz = quizzes.get(submission.quiz_id()).await?;
                submission.complete(&quiz)?;
                submissions.save(&submission).await?;
                Ok(submission)
            },
        )
        .await?;

        tracing::info!(submission_id = %id, score = ?submission.score(), "Submission completed");
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{author::AuthorId, question::Question, submission::SubmissionStatus},
        repositories::memory::InMemoryStore,
        services::Services,
    };

    fn author(email: &str) -> Author {
        Author {
            id: AuthorId::new(),
            email: email.to_string(),
            hashed_password: String::new(),
        }
    }

    fn picks(options: &[&str]) -> Option<BTreeSet<String>> {
        Some(options.iter().map(|o| o.to_string()).collect())
    }

    async fn published_quiz(services: &Services, owner: &Author) -> QuizId {
        let quiz = services.quizzes.create(owner, "Capitals").await.unwrap();
        let questions = vec![
            Question::new("France?", ["Paris", "Lyon"], ["Paris"]).unwrap(),
            Question::new("Cities in Italy?", ["Rome", "Milan", "Oslo"], ["Rome", "Milan"])
                .unwrap(),
        ];
        services
            .quizzes
            .edit(owner, quiz.id(), "Capitals", questions)
            .await
            .unwrap();
        services.quizzes.publish(owner, quiz.id()).await.unwrap();
        quiz.id()
    }

    fn setup() -> (Services, Author, Author) {
        let services = Services::in_memory(&InMemoryStore::new(), RetryParams::default());
        (services, author("owner@example.com"), author("taker@example.com"))
    }

    #[tokio::test]
    async fn full_flow_scores_the_submission() {
        let (services, owner, taker) = setup();
        let quiz_id = published_quiz(&services, &owner).await;

        let submission = services.submissions.start(&taker, quiz_id).await.unwrap();
        assert_eq!(submission.answers().len(), 2);

        services
            .submissions
            .answer(&taker, submission.id(), vec![picks(&["Paris"]), picks(&["Rome", "Oslo"])])
            .await
            .unwrap();
        let completed = services.submissions.complete(&taker, submission.id()).await.unwrap();

        assert_eq!(completed.status(), SubmissionStatus::Completed);
        assert_eq!(completed.score(), Some(0.5));

        let mine = services.submissions.list(&taker).await.unwrap();
        assert_eq!(mine, vec![completed.clone()]);

        let for_owner = services.quizzes.submissions(&owner, quiz_id, 1, 10).await.unwrap();
        assert_eq!(for_owner, vec![completed]);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let (services, owner, taker) = setup();
        let quiz_id = published_quiz(&services, &owner).await;

        services.submissions.start(&taker, quiz_id).await.unwrap();
        assert!(matches!(
            services.submissions.start(&taker, quiz_id).await,
            Err(ServiceError::SubmissionValidation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_or_draft_quiz_cannot_be_started() {
        let (services, owner, taker) = setup();
        let draft = services.quizzes.create(&owner, "Draft").await.unwrap();

        assert!(matches!(
            services.submissions.start(&taker, QuizId::new()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.submissions.start(&taker, draft.id()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn other_authors_cannot_touch_a_submission() {
        let (services, owner, taker) = setup();
        let quiz_id = published_quiz(&services, &owner).await;
        let submission = services.submissions.start(&taker, quiz_id).await.unwrap();

        assert!(matches!(
            services.submissions.get(&owner, submission.id()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.submissions.answer(&owner, submission.id(), vec![None, None]).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            services.submissions.complete(&owner, submission.id()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn completed_submission_is_frozen() {
        let (services, owner, taker) = setup();
        let quiz_id = published_quiz(&services, &owner).await;
        let submission = services.submissions.start(&taker, quiz_id).await.unwrap();
        services.submissions.complete(&taker, submission.id()).await.unwrap();

        assert!(matches!(
            services
                .submissions
                .answer(&taker, submission.id(), vec![picks(&["Paris"]), None])
                .await,
            Err(ServiceError::SubmissionValidation(_))
        ));
        assert!(matches!(
            services.submissions.complete(&taker, submission.id()).await,
            Err(ServiceError::SubmissionValidation(_))
        ));
    }

    #[tokio::test]
    async fn invalid_answers_leave_submission_unchanged() {
        let (services, owner, taker) = setup();
        let quiz_id = published_quiz(&services, &owner).await;
        let submission = services.submissions.start(&taker, quiz_id).await.unwrap();

        assert!(matches!(
            services
                .submissions
                .answer(&taker, submission.id(), vec![picks(&["Paris", "Lyon"])])
                .await,
            Err(ServiceError::SubmissionValidation(_))
        ));
        assert_eq!(
            services.submissions.get(&taker, submission.id()).await.unwrap(),
            submission
        );
    }
}
