// src/models/submission.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{
        author::AuthorId,
        quiz::{Quiz, QuizId},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SubmissionStatus::InProgress),
            "completed" => Ok(SubmissionStatus::Completed),
            other => Err(format!("unknown submission status '{}'", other)),
        }
    }
}

/// The options picked for one question, scored once the submission completes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Answer {
    options: BTreeSet<String>,
    score: Option<f64>,
}

impl Answer {
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            score: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn restore(options: BTreeSet<String>, score: Option<f64>) -> Self {
        Self { options, score }
    }

    pub fn options(&self) -> &BTreeSet<String> {
        &self.options
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.options.len() == 1
    }

    pub fn with_score(self, score: f64) -> Self {
        Self {
            score: Some(score),
            ..self
        }
    }
}

/// One author's attempt at one quiz.
///
/// `answers` lines up with the quiz's questions; `None` marks an unanswered slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    id: SubmissionId,
    quiz_id: QuizId,
    author_id: AuthorId,
    status: SubmissionStatus,
    answers: Vec<Option<Answer>>,
    score: Option<f64>,
    created_at: DateTime<Utc>,
}

impl Submission {
    /// Opens a submission on a published quiz.
    ///
    /// `existing` are the author's current submissions; any of them for the
    /// same quiz makes this fail.
    pub fn start(
        quiz: &Quiz,
        author_id: AuthorId,
        existing: &[Submission],
    ) -> Result<Self, ServiceError> {
        if !quiz.can_be_answered() {
            return Err(ServiceError::not_found(format!("Quiz {}", quiz.id())));
        }

        if existing
            .iter()
            .any(|s| s.author_id == author_id && s.quiz_id == quiz.id())
        {
            return Err(ServiceError::SubmissionValidation(vec![format!(
                "Author {} already has a submission for quiz {}",
                author_id,
                quiz.id()
            )]));
        }

        Ok(Self {
            id: SubmissionId::new(),
            quiz_id: quiz.id(),
            author_id,
            status: SubmissionStatus::InProgress,
            answers: vec![Some(Answer::empty()); quiz.questions().len()],
            score: None,
            created_at: Utc::now(),
        })
    }

    pub fn restore(
        id: SubmissionId,
        quiz_id: QuizId,
        author_id: AuthorId,
        status: SubmissionStatus,
        answers: Vec<Option<Answer>>,
        score: Option<f64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            quiz_id,
            author_id,
            status,
            answers,
            score,
            created_at,
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    pub fn author_id(&self) -> AuthorId {
        self.author_id
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn answers(&self) -> &[Option<Answer>] {
        &self.answers
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_completed(&self) -> bool {
        self.status == SubmissionStatus::Completed
    }

    fn ensure_in_progress(&self) -> Result<(), ServiceError> {
        if self.is_completed() {
            return Err(ServiceError::SubmissionValidation(vec![format!(
                "Submission {} is already completed",
                self.id
            )]));
        }
        Ok(())
    }

    /// Replaces the whole answer list. Partial updates are not supported.
    pub fn answer(
        &mut self,
        quiz: &Quiz,
        answers: Vec<Option<BTreeSet<String>>>,
    ) -> Result<(), ServiceError> {
        self.ensure_in_progress()?;

        let parsed: Vec<Option<Answer>> = answers
            .into_iter()
            .map(|options| options.map(Answer::new))
            .collect();
        quiz.validate_answers(&parsed)?;
        self.answers = parsed;
        Ok(())
    }

    /// Scores every answered slot and closes the submission.
    pub fn complete(&mut self, quiz: &Quiz) -> Result<(), ServiceError> {
        self.ensure_in_progress()?;

        let scored = quiz.score(&self.answers)?;
        let total: f64 = scored.iter().flatten().filter_map(Answer::score).sum();

        self.answers = scored;
        self.score = Some(total);
        self.status = SubmissionStatus::Completed;
        Ok(())
    }
}

/// DTO for starting a submission.
#[derive(Debug, Deserialize)]
pub struct StartSubmissionRequest {
    pub quiz_id: QuizId,
}

/// DTO for answering. One entry per question, `null` leaves it unanswered.
#[derive(Debug, Deserialize)]
pub struct AnswerSubmissionRequest {
    pub answers: Vec<Option<BTreeSet<String>>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub options: Vec<String>,
    pub score: Option<f64>,
}

/// DTO for returning a submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub id: SubmissionId,
    pub quiz_id: QuizId,
    pub author_id: AuthorId,
    pub status: SubmissionStatus,
    pub answers: Vec<Option<AnswerResponse>>,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionResponse {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id,
            quiz_id: submission.quiz_id,
            author_id: submission.author_id,
            status: submission.status,
            answers: submission
                .answers
                .iter()
                .map(|answer| {
                    answer.as_ref().map(|a| AnswerResponse {
                        options: a.options.iter().cloned().collect(),
                        score: a.score,
                    })
                })
                .collect(),
            score: submission.score,
            created_at: submission.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Question;

    fn published_quiz() -> Quiz {
        let mut quiz = Quiz::new("Mixed", AuthorId::new());
        quiz.set_questions(vec![
            Question::new("single", ["A", "B"], ["A"]).unwrap(),
            Question::new("multi", ["A", "B", "C"], ["A", "B"]).unwrap(),
        ])
        .unwrap();
        quiz.publish().unwrap();
        quiz
    }

    fn picks(options: &[&str]) -> Option<BTreeSet<String>> {
        Some(options.iter().map(|o| o.to_string()).collect())
    }

    #[test]
    fn start_creates_one_empty_answer_per_question() {
        let quiz = published_quiz();
        let author = AuthorId::new();

        let submission = Submission::start(&quiz, author, &[]).unwrap();

        assert_eq!(submission.quiz_id(), quiz.id());
        assert_eq!(submission.author_id(), author);
        assert_eq!(submission.status(), SubmissionStatus::InProgress);
        assert_eq!(submission.answers().len(), 2);
        assert!(submission.answers().iter().all(|a| a.as_ref().unwrap().is_empty()));
        assert_eq!(submission.score(), None);
    }

    #[test]
    fn start_rejects_drafts() {
        let quiz = Quiz::new("Draft", AuthorId::new());
        assert!(matches!(
            Submission::start(&quiz, AuthorId::new(), &[]),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn start_rejects_second_submission_for_same_quiz() {
        let quiz = published_quiz();
        let author = AuthorId::new();
        let first = Submission::start(&quiz, author, &[]).unwrap();

        assert!(matches!(
            Submission::start(&quiz, author, &[first.clone()]),
            Err(ServiceError::SubmissionValidation(_))
        ));
        assert!(Submission::start(&quiz, AuthorId::new(), &[first]).is_ok());
    }

    #[test]
    fn answer_replaces_whole_list() {
        let quiz = published_quiz();
        let mut submission = Submission::start(&quiz, AuthorId::new(), &[]).unwrap();

        submission.answer(&quiz, vec![picks(&["A"]), None]).unwrap();
        assert!(submission.answers()[1].is_none());

        submission.answer(&quiz, vec![picks(&["B"]), picks(&["A", "C"])]).unwrap();
        assert_eq!(submission.answers()[0].as_ref().unwrap().options().len(), 1);
        assert_eq!(submission.answers()[1].as_ref().unwrap().options().len(), 2);
    }

    #[test]
    fn answer_collects_violations_across_questions() {
        let quiz = published_quiz();
        let mut submission = Submission::start(&quiz, AuthorId::new(), &[]).unwrap();

        match submission.answer(&quiz, vec![picks(&["A", "B"]), picks(&["Z"])]) {
            Err(ServiceError::SubmissionValidation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(submission.answers().iter().all(|a| a.as_ref().unwrap().is_empty()));
    }

    #[test]
    fn complete_scores_and_freezes() {
        let quiz = published_quiz();
        let mut submission = Submission::start(&quiz, AuthorId::new(), &[]).unwrap();
        submission.answer(&quiz, vec![picks(&["A"]), picks(&["A"])]).unwrap();

        submission.complete(&quiz).unwrap();

        assert!(submission.is_completed());
        assert_eq!(submission.score(), Some(1.5));
        assert_eq!(submission.answers()[0].as_ref().unwrap().score(), Some(1.0));
        assert_eq!(submission.answers()[1].as_ref().unwrap().score(), Some(0.5));

        assert!(submission.answer(&quiz, vec![picks(&["B"]), None]).is_err());
        assert!(submission.complete(&quiz).is_err());
        assert_eq!(submission.score(), Some(1.5));
    }

    #[test]
    fn unanswered_questions_add_nothing() {
        let quiz = published_quiz();
        let mut submission = Submission::start(&quiz, AuthorId::new(), &[]).unwrap();
        submission.answer(&quiz, vec![None, picks(&["C"])]).unwrap();

        submission.complete(&quiz).unwrap();

        assert_eq!(submission.score(), Some(-1.0));
        assert!(submission.answers()[0].is_none());
    }
}
