// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, quiz, submission},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * `/api/signup` and `/api/login` are public.
/// * Quiz and submission routes require a bearer token.
/// * Trace and CORS layers wrap everything.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/quizzes", post(quiz::create_quiz).get(quiz::list_quizzes))
        .route("/quizzes/{id}", get(quiz::get_quiz).put(quiz::update_quiz))
        .route("/quizzes/{id}/publish", post(quiz::publish_quiz))
        .route("/quizzes/{id}/submissions", get(quiz::list_quiz_submissions))
        .route(
            "/submissions",
            post(submission::start_submission).get(submission::list_submissions),
        )
        .route("/submissions/{id}", get(submission::get_submission))
        .route("/submissions/{id}/answers", put(submission::answer_submission))
        .route("/submissions/{id}/complete", put(submission::complete_submission))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", auth_routes.merge(protected_routes))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
