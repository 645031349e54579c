mod assessments;
mod dialogues;
mod explorations;
mod health;
mod mastery;
mod practice;
mod recommendations;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/mastery", mastery::router())
        .nest("/api/recommendations", recommendations::router())
        .nest("/api/practice", practice::router())
        .nest("/api/dialogues", dialogues::router())
        .nest("/api/explorations", explorations::router())
        .nest("/api/assessments", assessments::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}
