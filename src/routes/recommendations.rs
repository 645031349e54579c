use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::recommend::LearnerContext;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(recommend))
}

async fn recommend(
    State(state): State<AppState>,
    Json(context): Json<LearnerContext>,
) -> Result<impl IntoResponse, AppError> {
    if context.learner_id.trim().is_empty() {
        return Err(AppError::validation("learnerId is required"));
    }
    Ok(ok(state.engine().recommend(context, Utc::now())))
}
