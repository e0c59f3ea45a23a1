// src/handlers/submission.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        author::Author,
        submission::{AnswerSubmissionRequest, StartSubmissionRequest, SubmissionId, SubmissionResponse},
    },
    services::Services,
};

/// Starts the caller's submission for a published quiz.
pub async fn start_submission(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Json(payload): Json<StartSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = services.submissions.start(&author, payload.quiz_id).await?;
    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(&submission))))
}

pub async fn list_submissions(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = services.submissions.list(&author).await?;
    let body: Vec<SubmissionResponse> = submissions.iter().map(SubmissionResponse::from).collect();
    Ok(Json(body))
}

pub async fn get_submission(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<SubmissionId>,
) -> Result<impl IntoResponse, AppError> {
    let submission = services.submissions.get(&author, id).await?;
    Ok(Json(SubmissionResponse::from(&submission)))
}

/// Replaces every answer. One entry per question, `null` leaves a question unanswered.
pub async fn answer_submission(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<SubmissionId>,
    Json(payload): Json<AnswerSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = services
        .submissions
        .answer(&author, id, payload.answers)
        .await?;
    Ok(Json(SubmissionResponse::from(&submission)))
}

/// Scores and closes the submission.
pub async fn complete_submission(
    State(services): State<Services>,
    Extension(author): Extension<Author>,
    Path(id): Path<SubmissionId>,
) -> Result<impl IntoResponse, AppError> {
    let submission = services.submissions.complete(&author, id).await?;
    Ok(Json(SubmissionResponse::from(&submission)))
}
