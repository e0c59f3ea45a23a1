// src/models/question.rs

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ServiceError, models::submission::Answer};

pub const MAX_OPTIONS: usize = 5;

/// A multiple-choice question.
///
/// Options keep the order the author gave them; correct options are a set
/// drawn from those options.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    text: String,
    options: Vec<String>,
    correct_options: BTreeSet<String>,

    /// Redaction for non-owners. Never persisted, never touches `correct_options`.
    answers_hidden: bool,
}

impl Question {
    /// Builds a question, reporting every violated rule at once.
    pub fn new<O, C>(text: impl Into<String>, options: O, correct_options: C) -> Result<Self, ServiceError>
    where
        O: IntoIterator,
        O::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let text = text.into();
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        let correct_options: BTreeSet<String> = correct_options.into_iter().map(Into::into).collect();

        let mut errors = Vec::new();
        if options.is_empty() {
            errors.push(format!("Question '{}' must have at least one option", text));
        }
        if options.len() > MAX_OPTIONS {
            errors.push(format!("Question '{}' can have at most {} options", text, MAX_OPTIONS));
        }
        if options.iter().collect::<HashSet<_>>().len() != options.len() {
            errors.push(format!("Question '{}' options must be unique", text));
        }
        if correct_options.is_empty() {
            errors.push(format!("Question '{}' must have at least one correct option", text));
        }
        if correct_options.iter().any(|c| !options.contains(c)) {
            errors.push(format!(
                "All correct options for question '{}' must be present in the options list",
                text
            ));
        }
        if !errors.is_empty() {
            return Err(ServiceError::QuizValidation(errors));
        }

        Ok(Self {
            text,
            options,
            correct_options,
            answers_hidden: false,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The canonical answer key, regardless of redaction.
    pub fn correct_options(&self) -> &BTreeSet<String> {
        &self.correct_options
    }

    /// The answer key as a viewer may see it: empty once hidden.
    pub fn visible_correct_options(&self) -> Vec<String> {
        if self.answers_hidden {
            Vec::new()
        } else {
            self.correct_options.iter().cloned().collect()
        }
    }

    pub fn is_single_choice(&self) -> bool {
        self.correct_options.len() == 1
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.correct_options.len() > 1
    }

    pub fn hide_correct_answers(&mut self) {
        self.answers_hidden = true;
    }

    pub fn answers_hidden(&self) -> bool {
        self.answers_hidden
    }

    /// Appends a message for each rule `answer` breaks. Empty answers are always valid.
    pub(crate) fn validate_answer(&self, answer: &Answer, errors: &mut Vec<String>) {
        if answer.is_empty() {
            return;
        }

        let unknown: Vec<&str> = answer
            .options()
            .iter()
            .filter(|o| !self.options.contains(o))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            errors.push(format!(
                "Answer to question '{}' contains unknown options: {}",
                self.text,
                unknown.join(", ")
            ));
        }

        if self.is_single_choice() && answer.options().len() > 1 {
            errors.push(format!("Question '{}' must have a single choice answer", self.text));
        }
    }

    /// Scores a validated answer.
    ///
    /// Single choice: exact match +1, empty 0, anything else -1.
    /// Multiple choice: each correct pick adds `1/k`, each wrong pick subtracts
    /// `1/(n-k)` (nothing when every option is correct).
    pub(crate) fn score(&self, answer: &Answer) -> f64 {
        if self.is_single_choice() {
            if answer.is_empty() {
                return 0.0;
            }
            return if answer.options() == &self.correct_options { 1.0 } else { -1.0 };
        }

        let correct = self.correct_options.len();
        let total = self.options.len();
        let right_weight = 1.0 / correct as f64;
        let wrong_weight = if correct == total {
            0.0
        } else {
            1.0 / (total - correct) as f64
        };

        answer.options().iter().fold(0.0, |score, option| {
            if self.correct_options.contains(option) {
                score + right_weight
            } else {
                score - wrong_weight
            }
        })
    }
}

/// DTO for one question inside a quiz update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_options: Vec<String>,
}

impl QuestionRequest {
    /// Converts every request, collecting the errors of all questions into one.
    pub fn into_questions(requests: Vec<QuestionRequest>) -> Result<Vec<Question>, ServiceError> {
        let mut questions = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();

        for request in requests {
            match Question::new(request.text, request.options, request.correct_options) {
                Ok(question) => questions.push(question),
                Err(ServiceError::QuizValidation(mut found)) => errors.append(&mut found),
                Err(other) => return Err(other),
            }
        }

        if errors.is_empty() {
            Ok(questions)
        } else {
            Err(ServiceError::QuizValidation(errors))
        }
    }
}

/// Count and uniqueness are domain rules; only the size of each option is checked here.
fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}

/// DTO for sending a question to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub text: String,
    pub options: Vec<String>,
    pub correct_options: Vec<String>,
    pub is_single_choice: bool,
}

impl From<&Question> for QuestionResponse {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            options: question.options.clone(),
            correct_options: question.visible_correct_options(),
            is_single_choice: question.is_single_choice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(options: &[&str]) -> Answer {
        Answer::new(options.iter().copied())
    }

    fn errors_of(result: Result<Question, ServiceError>) -> Vec<String> {
        match result {
            Err(ServiceError::QuizValidation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_question_reports_choice_kind() {
        let single = Question::new("Capital of France?", ["Paris", "Rome"], ["Paris"]).unwrap();
        assert!(single.is_single_choice());
        assert!(!single.is_multiple_choice());

        let multi = Question::new("Primes?", ["2", "3", "4"], ["2", "3"]).unwrap();
        assert!(multi.is_multiple_choice());
    }

    #[test]
    fn rejects_empty_options_and_empty_key_together() {
        let errors = errors_of(Question::new("Q", Vec::<String>::new(), Vec::<String>::new()));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("at least one option"));
        assert!(errors[1].contains("at least one correct option"));
    }

    #[test]
    fn rejects_too_many_duplicate_options_with_foreign_key() {
        let errors = errors_of(Question::new("Q", ["A", "B", "C", "D", "E", "A"], ["Z"]));
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("at most 5 options"));
        assert!(errors[1].contains("must be unique"));
        assert!(errors[2].contains("present in the options list"));
    }

    #[test]
    fn single_choice_scoring() {
        let q = Question::new("Q", ["A", "B", "C"], ["A"]).unwrap();
        assert_eq!(q.score(&answer(&["A"])), 1.0);
        assert_eq!(q.score(&answer(&["B"])), -1.0);
        assert_eq!(q.score(&answer(&[])), 0.0);
    }

    #[test]
    fn multiple_choice_scoring() {
        let q = Question::new("Q", ["A", "B", "C"], ["A", "B"]).unwrap();
        assert_eq!(q.score(&answer(&["A"])), 0.5);
        assert_eq!(q.score(&answer(&["C"])), -1.0);
        assert_eq!(q.score(&answer(&["A", "B"])), 1.0);
        assert_eq!(q.score(&answer(&["A", "B", "C"])), 0.0);
    }

    #[test]
    fn all_options_correct_has_no_penalty() {
        let q = Question::new("Q", ["A", "B"], ["A", "B"]).unwrap();
        assert_eq!(q.score(&answer(&["A"])), 0.5);
        assert_eq!(q.score(&answer(&["A", "B"])), 1.0);
    }

    #[test]
    fn answer_validation_collects_unknown_and_multi_pick() {
        let q = Question::new("Q", ["A", "B"], ["A"]).unwrap();
        let mut errors = Vec::new();
        q.validate_answer(&answer(&["A", "X"]), &mut errors);
        assert_eq!(errors.len(), 2);

        let mut errors = Vec::new();
        q.validate_answer(&answer(&[]), &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn hiding_redacts_view_but_keeps_key() {
        let mut q = Question::new("Q", ["A", "B"], ["A"]).unwrap();
        q.hide_correct_answers();
        assert!(QuestionResponse::from(&q).correct_options.is_empty());
        assert_eq!(q.correct_options().len(), 1);
        assert!(q.is_single_choice());
    }

    #[test]
    fn request_conversion_aggregates_across_questions() {
        let requests = vec![
            QuestionRequest {
                text: "first".into(),
                options: vec![],
                correct_options: vec!["A".into()],
            },
            QuestionRequest {
                text: "second".into(),
                options: vec!["A".into()],
                correct_options: vec![],
            },
        ];
        match QuestionRequest::into_questions(requests) {
            Err(ServiceError::QuizValidation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("'first'")));
                assert!(errors.iter().any(|e| e.contains("'second'")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
