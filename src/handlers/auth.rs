// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::author::{AuthorResponse, CredentialsRequest},
    services::Services,
    utils::jwt::sign_jwt,
};

/// Registers a new author.
///
/// Returns 201 Created and the author (without the password hash).
pub async fn signup(
    State(services): State<Services>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let author = services
        .authors
        .create(&payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthorResponse::from(&author))))
}

/// Exchanges email and password for a bearer token.
pub async fn login(
    State(services): State<Services>,
    State(config): State<Config>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author = services
        .authors
        .authenticate(&payload.email, &payload.password)
        .await?;

    let token = sign_jwt(&author.email, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer"
    })))
}
