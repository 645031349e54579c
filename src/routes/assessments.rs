use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::assessment::{AssessmentAnswer, AssessmentContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger", post(trigger))
        .route("/results", post(submit_results))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsRequest {
    learner_id: String,
    answers: Vec<AssessmentAnswer>,
}

async fn trigger(
    State(state): State<AppState>,
    Json(context): Json<AssessmentContext>,
) -> Result<impl IntoResponse, AppError> {
    if context.learner_id.trim().is_empty() {
        return Err(AppError::validation("learnerId is required"));
    }
    let decision = state.engine().trigger_assessment(context, Utc::now()).await;
    Ok(ok(decision))
}

async fn submit_results(
    State(state): State<AppState>,
    Json(payload): Json<ResultsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.learner_id.trim().is_empty() {
        return Err(AppError::validation("learnerId is required"));
    }
    let result = state
        .engine()
        .submit_assessment(&payload.learner_id, &payload.answers, Utc::now())?;
    Ok(ok(result))
}
