// src/repositories/postgres.rs

//! PostgreSQL repositories.
//!
//! Every method runs inside the manager's current transaction, opening a
//! scope of its own so it also works when called outside a service.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AuthorRepository, QuizRepository, SubmissionRepository, page_bounds};
use crate::{
    error::{ServiceError, is_unique_violation},
    models::{
        author::{Author, AuthorId},
        question::Question,
        quiz::{Quiz, QuizFilter, QuizId, QuizStatus},
        submission::{Answer, Submission, SubmissionId, SubmissionStatus},
    },
    transaction::{
        IsolationLevel, Transaction, finish,
        postgres::{PgTransaction, PgTransactionManager},
    },
};

/// Runs `work` in a nested scope of the current transaction.
async fn scoped<T, F, Fut>(manager: &PgTransactionManager, work: F) -> Result<T, ServiceError>
where
    F: FnOnce(Arc<PgTransaction>) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let tx = manager.current(IsolationLevel::ReadCommitted);
    tx.begin().await?;
    let result = work(Arc::clone(&tx)).await;
    finish(tx.as_ref(), result).await
}

fn decode_error(message: String) -> ServiceError {
    ServiceError::Database(sqlx::Error::Decode(message.into()))
}

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    author_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QuestionRow {
    quiz_id: Uuid,
    text: String,
    options: Vec<String>,
    correct_options: Vec<String>,
}

impl QuizRow {
    fn into_quiz(self, questions: Vec<QuestionRow>) -> Result<Quiz, ServiceError> {
        let status = self.status.parse::<QuizStatus>().map_err(decode_error)?;
        let questions = questions
            .into_iter()
            .map(|q| Question::new(q.text, q.options, q.correct_options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Quiz::restore(
            QuizId(self.id),
            self.title,
            AuthorId(self.author_id),
            status,
            questions,
            self.created_at,
        ))
    }
}

async fn questions_for(
    conn: &mut PgConnection,
    quiz_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<QuestionRow>>, ServiceError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT quiz_id, text, options, correct_options
        FROM question
        WHERE quiz_id = ANY($1)
        ORDER BY quiz_id, position
        "#,
    )
    .bind(quiz_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<QuestionRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.quiz_id).or_default().push(row);
    }
    Ok(grouped)
}

pub struct PgQuizRepository {
    manager: Arc<PgTransactionManager>,
}

impl PgQuizRepository {
    pub fn new(manager: Arc<PgTransactionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl QuizRepository for PgQuizRepository {
    async fn get(&self, id: QuizId) -> Result<Quiz, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let row = sqlx::query_as::<_, QuizRow>(
                "SELECT id, title, author_id, status, created_at FROM quiz WHERE id = $1",
            )
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Quiz {}", id)))?;

            let mut questions = questions_for(&mut conn, vec![id.0]).await?;
            row.into_quiz(questions.remove(&id.0).unwrap_or_default())
        })
        .await
    }

    async fn save(&self, quiz: &Quiz) -> Result<(), ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quiz WHERE id = $1)")
                    .bind(quiz.id().0)
                    .fetch_one(&mut *conn)
                    .await?;

            if exists {
                sqlx::query("UPDATE quiz SET title = $2, author_id = $3, status = $4 WHERE id = $1")
                    .bind(quiz.id().0)
                    .bind(quiz.title())
                    .bind(quiz.author_id().0)
                    .bind(quiz.status().as_str())
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("DELETE FROM question WHERE quiz_id = $1")
                    .bind(quiz.id().0)
                    .execute(&mut *conn)
                    .await?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO quiz (id, title, author_id, status, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(quiz.id().0)
                .bind(quiz.title())
                .bind(quiz.author_id().0)
                .bind(quiz.status().as_str())
                .bind(quiz.created_at())
                .execute(&mut *conn)
                .await?;
            }

            for (position, question) in quiz.questions().iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO question (quiz_id, position, text, options, correct_options)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(quiz.id().0)
                .bind(position as i32)
                .bind(question.text())
                .bind(question.options().to_vec())
                .bind(question.correct_options().iter().cloned().collect::<Vec<_>>())
                .execute(&mut *conn)
                .await?;
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let (offset, limit) = page_bounds(filter.page, filter.page_size);

            let mut query = QueryBuilder::<Postgres>::new(
                "SELECT id, title, author_id, status, created_at FROM quiz WHERE TRUE",
            );
            if let Some(status) = filter.status {
                query.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(author_id) = filter.author_id {
                query.push(" AND author_id = ").push_bind(author_id.0);
            }
            query
                .push(" ORDER BY created_at, id LIMIT ")
                .push_bind(limit as i64)
                .push(" OFFSET ")
                .push_bind(offset as i64);

            let rows: Vec<QuizRow> = query.build_query_as().fetch_all(&mut *conn).await?;
            let ids = rows.iter().map(|r| r.id).collect();
            let mut questions = questions_for(&mut conn, ids).await?;

            rows.into_iter()
                .map(|row| {
                    let own = questions.remove(&row.id).unwrap_or_default();
                    row.into_quiz(own)
                })
                .collect()
        })
        .await
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: Uuid,
    quiz_id: Uuid,
    author_id: Uuid,
    status: String,
    score: Option<f64>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct AnswerRow {
    submission_id: Uuid,
    options: Option<Vec<String>>,
    score: Option<f64>,
}

impl SubmissionRow {
    fn into_submission(self, answers: Vec<AnswerRow>) -> Result<Submission, ServiceError> {
        let status = self.status.parse::<SubmissionStatus>().map_err(decode_error)?;
        let answers = answers
            .into_iter()
            .map(|a| {
                a.options
                    .map(|options| Answer::restore(options.into_iter().collect(), a.score))
            })
            .collect();
        Ok(Submission::restore(
            SubmissionId(self.id),
            QuizId(self.quiz_id),
            AuthorId(self.author_id),
            status,
            answers,
            self.score,
            self.created_at,
        ))
    }
}

async fn answers_for(
    conn: &mut PgConnection,
    submission_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<AnswerRow>>, ServiceError> {
    let rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT submission_id, options, score
        FROM answer
        WHERE submission_id = ANY($1)
        ORDER BY submission_id, position
        "#,
    )
    .bind(submission_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<AnswerRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.submission_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn assemble(
    conn: &mut PgConnection,
    rows: Vec<SubmissionRow>,
) -> Result<Vec<Submission>, ServiceError> {
    let ids = rows.iter().map(|r| r.id).collect();
    let mut answers = answers_for(conn, ids).await?;
    rows.into_iter()
        .map(|row| {
            let own = answers.remove(&row.id).unwrap_or_default();
            row.into_submission(own)
        })
        .collect()
}

const SUBMISSION_COLUMNS: &str = "id, quiz_id, author_id, status, score, created_at";

pub struct PgSubmissionRepository {
    manager: Arc<PgTransactionManager>,
}

impl PgSubmissionRepository {
    pub fn new(manager: Arc<PgTransactionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl SubmissionRepository for PgSubmissionRepository {
    async fn get(&self, id: SubmissionId) -> Result<Submission, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let row = sqlx::query_as::<_, SubmissionRow>(&format!(
                "SELECT {} FROM submission WHERE id = $1",
                SUBMISSION_COLUMNS
            ))
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Submission {}", id)))?;

            let mut submissions = assemble(&mut conn, vec![row]).await?;
            submissions
                .pop()
                .ok_or_else(|| ServiceError::not_found(format!("Submission {}", id)))
        })
        .await
    }

    async fn save(&self, submission: &Submission) -> Result<(), ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM submission WHERE id = $1)")
                    .bind(submission.id().0)
                    .fetch_one(&mut *conn)
                    .await?;

            if exists {
                sqlx::query("UPDATE submission SET status = $2, score = $3 WHERE id = $1")
                    .bind(submission.id().0)
                    .bind(submission.status().as_str())
                    .bind(submission.score())
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("DELETE FROM answer WHERE submission_id = $1")
                    .bind(submission.id().0)
                    .execute(&mut *conn)
                    .await?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO submission (id, quiz_id, author_id, status, score, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(submission.id().0)
                .bind(submission.quiz_id().0)
                .bind(submission.author_id().0)
                .bind(submission.status().as_str())
                .bind(submission.score())
                .bind(submission.created_at())
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ServiceError::SubmissionValidation(vec![format!(
                            "Author {} already has a submission for quiz {}",
                            submission.author_id(),
                            submission.quiz_id()
                        )])
                    } else {
                        ServiceError::from(e)
                    }
                })?;
            }

            for (position, answer) in submission.answers().iter().enumerate() {
                let options: Option<Vec<String>> =
                    answer.as_ref().map(|a| a.options().iter().cloned().collect());
                sqlx::query(
                    r#"
                    INSERT INTO answer (submission_id, position, options, score)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(submission.id().0)
                .bind(position as i32)
                .bind(options)
                .bind(answer.as_ref().and_then(Answer::score))
                .execute(&mut *conn)
                .await?;
            }
            Ok(())
        })
        .await
    }

    async fn by_author(&self, author_id: AuthorId) -> Result<Vec<Submission>, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
                "SELECT {} FROM submission WHERE author_id = $1 ORDER BY created_at, id",
                SUBMISSION_COLUMNS
            ))
            .bind(author_id.0)
            .fetch_all(&mut *conn)
            .await?;
            assemble(&mut conn, rows).await
        })
        .await
    }

    async fn by_quiz(
        &self,
        quiz_id: QuizId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Submission>, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let (offset, limit) = page_bounds(page, page_size);
            let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
                "SELECT {} FROM submission WHERE quiz_id = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3",
                SUBMISSION_COLUMNS
            ))
            .bind(quiz_id.0)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&mut *conn)
            .await?;
            assemble(&mut conn, rows).await
        })
        .await
    }
}

#[derive(FromRow)]
struct AuthorRow {
    id: Uuid,
    email: String,
    hashed_password: String,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Author {
            id: AuthorId(row.id),
            email: row.email,
            hashed_password: row.hashed_password,
        }
    }
}

pub struct PgAuthorRepository {
    manager: Arc<PgTransactionManager>,
}

impl PgAuthorRepository {
    pub fn new(manager: Arc<PgTransactionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl AuthorRepository for PgAuthorRepository {
    async fn get(&self, id: AuthorId) -> Result<Author, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            sqlx::query_as::<_, AuthorRow>(
                "SELECT id, email, hashed_password FROM author WHERE id = $1",
            )
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?
            .map(Author::from)
            .ok_or_else(|| ServiceError::not_found(format!("Author {}", id)))
        })
        .await
    }

    async fn by_email(&self, email: &str) -> Result<Author, ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            sqlx::query_as::<_, AuthorRow>(
                "SELECT id, email, hashed_password FROM author WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?
            .map(Author::from)
            .ok_or_else(|| ServiceError::not_found(format!("Author with email {}", email)))
        })
        .await
    }

    async fn save(&self, author: &Author) -> Result<(), ServiceError> {
        scoped(&self.manager, move |tx| async move {
            let mut conn = tx.connection().await?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM author WHERE id = $1)")
                    .bind(author.id.0)
                    .fetch_one(&mut *conn)
                    .await?;

            let statement = if exists {
                "UPDATE author SET email = $2, hashed_password = $3 WHERE id = $1"
            } else {
                "INSERT INTO author (id, email, hashed_password) VALUES ($1, $2, $3)"
            };
            sqlx::query(statement)
                .bind(author.id.0)
                .bind(&author.email)
                .bind(&author.hashed_password)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ServiceError::AuthorExists(format!(
                            "Author with email '{}' already exists",
                            author.email
                        ))
                    } else {
                        ServiceError::from(e)
                    }
                })?;
            Ok(())
        })
        .await
    }
}
