// src/models/quiz.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::ServiceError,
    models::{
        author::AuthorId,
        question::{Question, QuestionRequest, QuestionResponse},
        submission::Answer,
    },
};

pub const MAX_QUESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub Uuid);

impl QuizId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Draft,
    Published,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
        }
    }
}

impl FromStr for QuizStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuizStatus::Draft),
            "published" => Ok(QuizStatus::Published),
            other => Err(format!("unknown quiz status '{}'", other)),
        }
    }
}

/// A titled, ordered list of questions owned by one author.
///
/// Content can change only while the quiz is a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    author_id: AuthorId,
    status: QuizStatus,
    questions: Vec<Question>,
    created_at: DateTime<Utc>,
}

impl Quiz {
    /// A new empty draft.
    pub fn new(title: impl Into<String>, author_id: AuthorId) -> Self {
        Self {
            id: QuizId::new(),
            title: title.into(),
            author_id,
            status: QuizStatus::Draft,
            questions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Rebuilds a quiz from storage without re-running edit rules.
    pub fn restore(
        id: QuizId,
        title: String,
        author_id: AuthorId,
        status: QuizStatus,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            author_id,
            status,
            questions,
            created_at,
        }
    }

    pub fn id(&self) -> QuizId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author_id(&self) -> AuthorId {
        self.author_id
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_questions(&mut self, questions: Vec<Question>) -> Result<(), ServiceError> {
        if questions.is_empty() {
            return Err(ServiceError::QuizValidation(vec![format!(
                "Quiz {} must have at least one question",
                self.title
            )]));
        }
        if questions.len() > MAX_QUESTIONS {
            return Err(ServiceError::QuizValidation(vec![format!(
                "Quiz {} can have at most {} questions",
                self.title, MAX_QUESTIONS
            )]));
        }
        if self.status != QuizStatus::Draft {
            return Err(ServiceError::QuizValidation(vec![format!(
                "Quiz {} can only be edited if it is in draft status",
                self.title
            )]));
        }

        self.questions = questions;
        Ok(())
    }

    /// Draft -> Published. Publishing twice is rejected.
    pub fn publish(&mut self) -> Result<(), ServiceError> {
        if self.status == QuizStatus::Published {
            return Err(ServiceError::QuizValidation(vec![format!(
                "Quiz {} is already published",
                self.title
            )]));
        }
        if self.questions.is_empty() {
            return Err(ServiceError::QuizValidation(vec![format!(
                "Quiz {} must have at least one question to be published",
                self.title
            )]));
        }
        self.status = QuizStatus::Published;
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.status == QuizStatus::Published
    }

    /// Only published quizzes accept submissions.
    pub fn can_be_answered(&self) -> bool {
        self.is_published()
    }

    pub fn is_owned_by(&self, author_id: AuthorId) -> bool {
        self.author_id == author_id
    }

    pub fn hide_correct_answers(&mut self) {
        for question in &mut self.questions {
            question.hide_correct_answers();
        }
    }

    /// Checks `answers` against the questions they line up with.
    ///
    /// A count mismatch is reported on its own; otherwise the messages of all
    /// answered questions are collected into one error.
    pub fn validate_answers(&self, answers: &[Option<Answer>]) -> Result<(), ServiceError> {
        if answers.len() != self.questions.len() {
            return Err(ServiceError::SubmissionValidation(vec![format!(
                "Quiz {} has {} questions, but {} answers were submitted",
                self.title,
                self.questions.len(),
                answers.len()
            )]));
        }

        let mut errors = Vec::new();
        for (question, answer) in self.questions.iter().zip(answers) {
            if let Some(answer) = answer {
                question.validate_answer(answer, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::SubmissionValidation(errors))
        }
    }

    /// Returns `answers` with a score on every answered slot; unanswered slots stay `None`.
    pub fn score(&self, answers: &[Option<Answer>]) -> Result<Vec<Option<Answer>>, ServiceError> {
        self.validate_answers(answers)?;
        Ok(self
            .questions
            .iter()
            .zip(answers)
            .map(|(question, answer)| {
                answer
                    .as_ref()
                    .map(|answer| answer.clone().with_score(question.score(answer)))
            })
            .collect())
    }
}

/// Repository-level quiz listing criteria. `page` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizFilter {
    pub status: Option<QuizStatus>,
    pub author_id: Option<AuthorId>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for QuizFilter {
    fn default() -> Self {
        Self {
            status: None,
            author_id: None,
            page: 1,
            page_size: 10,
        }
    }
}

/// Query parameters for listing quizzes.
#[derive(Debug, Deserialize)]
pub struct QuizListParams {
    pub status: Option<QuizStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<QuizListParams> for QuizFilter {
    fn from(params: QuizListParams) -> Self {
        let defaults = QuizFilter::default();
        Self {
            status: params.status,
            author_id: None,
            page: params.page.unwrap_or(defaults.page),
            page_size: params.page_size.unwrap_or(defaults.page_size),
        }
    }
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,
}

/// DTO for replacing a draft's title and questions.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,
    #[validate(nested)]
    pub questions: Vec<QuestionRequest>,
}

/// DTO for returning a quiz.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: QuizId,
    pub title: String,
    pub author_id: AuthorId,
    pub status: QuizStatus,
    pub questions: Vec<QuestionResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Quiz> for QuizResponse {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            author_id: quiz.author_id,
            status: quiz.status,
            questions: quiz.questions.iter().map(QuestionResponse::from).collect(),
            created_at: quiz.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> Question {
        Question::new(text, ["A", "B", "C"], ["A"]).unwrap()
    }

    fn draft_with(count: usize) -> Quiz {
        let mut quiz = Quiz::new("Geography", AuthorId::new());
        if count > 0 {
            quiz.set_questions((0..count).map(|i| question(&format!("Q{}", i))).collect())
                .unwrap();
        }
        quiz
    }

    #[test]
    fn new_quiz_is_an_empty_draft() {
        let quiz = Quiz::new("Geography", AuthorId::new());
        assert_eq!(quiz.status(), QuizStatus::Draft);
        assert!(quiz.questions().is_empty());
    }

    #[test]
    fn set_questions_enforces_bounds() {
        let mut quiz = draft_with(0);
        assert!(quiz.set_questions(vec![]).is_err());

        let eleven = (0..11).map(|i| question(&format!("Q{}", i))).collect();
        assert!(matches!(
            quiz.set_questions(eleven),
            Err(ServiceError::QuizValidation(_))
        ));

        let ten = (0..10).map(|i| question(&format!("Q{}", i))).collect();
        quiz.set_questions(ten).unwrap();
        assert_eq!(quiz.questions().len(), 10);
    }

    #[test]
    fn published_quiz_is_frozen() {
        let mut quiz = draft_with(1);
        quiz.publish().unwrap();
        assert!(quiz.is_published());
        assert!(quiz.set_questions(vec![question("late")]).is_err());
        assert_eq!(quiz.questions().len(), 1);
    }

    #[test]
    fn publish_requires_a_question() {
        let mut quiz = draft_with(0);
        assert!(quiz.publish().is_err());
        assert_eq!(quiz.status(), QuizStatus::Draft);
    }

    #[test]
    fn publishing_twice_is_rejected() {
        let mut quiz = draft_with(2);
        quiz.publish().unwrap();
        match quiz.publish() {
            Err(ServiceError::QuizValidation(errors)) => {
                assert!(errors[0].contains("already published"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn hide_correct_answers_redacts_every_question() {
        let mut quiz = draft_with(3);
        quiz.hide_correct_answers();
        let view = QuizResponse::from(&quiz);
        assert!(view.questions.iter().all(|q| q.correct_options.is_empty()));
        assert!(quiz.questions().iter().all(|q| q.correct_options().len() == 1));
    }

    #[test]
    fn answer_count_mismatch_fails_first() {
        let quiz = draft_with(2);
        let answers = vec![Some(Answer::new(["nope", "also nope"]))];
        match quiz.validate_answers(&answers) {
            Err(ServiceError::SubmissionValidation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("has 2 questions, but 1 answers"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn score_keeps_unanswered_slots() {
        let quiz = draft_with(3);
        let answers = vec![Some(Answer::new(["A"])), None, Some(Answer::new(["B"]))];
        let scored = quiz.score(&answers).unwrap();
        assert_eq!(scored.len(), 3);
        assert_eq!(scored[0].as_ref().unwrap().score(), Some(1.0));
        assert!(scored[1].is_none());
        assert_eq!(scored[2].as_ref().unwrap().score(), Some(-1.0));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [QuizStatus::Draft, QuizStatus::Published] {
            assert_eq!(status.as_str().parse::<QuizStatus>().unwrap(), status);
        }
        assert!("archived".parse::<QuizStatus>().is_err());
    }
}
