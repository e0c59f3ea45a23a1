// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        author::Author,
        question::QuestionRequest,
        quiz::{CreateQuizRequest, QuizFilter, QuizId, QuizListParams, QuizResponse, UpdateQuizRequest},
        submission::SubmissionResponse,
    },
    services::Services,
    utils::html::clean_html,
};

/// `?page=&page_size=` for paged sub-collections.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Creates an empty draft.
pub async fn create_quiz(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Json(mut payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Clean before validating so a title that is only markup counts as empty.
    payload.title = clean_html(&payload.title);
    if let Err(e) = payload.validate() {
        return Err(AppError::BadRequest(e.to_string()));
    }

    let quiz = services.quizzes.create(&author, &payload.title).await?;

    Ok((StatusCode::CREATED, Json(QuizResponse::from(&quiz))))
}

/// Lists the caller's quizzes, or every published quiz with `?status=published`.
pub async fn list_quizzes(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = services
        .quizzes
        .list(&author, QuizFilter::from(params))
        .await?;

    let body: Vec<QuizResponse> = quizzes.iter().map(QuizResponse::from).collect();
    Ok(Json(body))
}

pub async fn get_quiz(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<QuizId>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = services.quizzes.get(&author, id).await?;
    Ok(Json(QuizResponse::from(&quiz)))
}

/// Replaces title and questions of a draft.
///
/// Request shape is checked by `validator`; domain rules (option count,
/// correct options, question count) come back from the service as one
/// aggregated validation error.
pub async fn update_quiz(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<QuizId>,
    Json(mut payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.title = clean_html(&payload.title);
    for question in &mut payload.questions {
        question.text = clean_html(&question.text);
    }
    if let Err(e) = payload.validate() {
        return Err(AppError::BadRequest(e.to_string()));
    }

    let questions = QuestionRequest::into_questions(payload.questions)?;

    let quiz = services
        .quizzes
        .edit(&author, id, &payload.title, questions)
        .await?;

    Ok(Json(QuizResponse::from(&quiz)))
}

pub async fn publish_quiz(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<QuizId>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = services.quizzes.publish(&author, id).await?;
    Ok(Json(QuizResponse::from(&quiz)))
}

/// Submissions to one of the caller's quizzes.
pub async fn list_quiz_submissions(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<QuizId>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let defaults = QuizFilter::default();
    let submissions = services
        .quizzes
        .submissions(
            &author,
            id,
            params.page.unwrap_or(defaults.page),
            params.page_size.unwrap_or(defaults.page_size),
        )
        .await?;

    let body: Vec<SubmissionResponse> = submissions.iter().map(SubmissionResponse::from).collect();
    Ok(Json(body))
}
