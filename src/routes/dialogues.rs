use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::socratic::{DialoguePlan, LearnerResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_dialogue))
        .route("/:id/responses", post(respond))
        .route("/:id/end", post(end_dialogue))
}

async fn start_dialogue(
    State(state): State<AppState>,
    Json(plan): Json<DialoguePlan>,
) -> Result<impl IntoResponse, AppError> {
    if plan.target_concept.trim().is_empty() {
        return Err(AppError::validation("targetConcept is required"));
    }
    let view = state.engine().start_dialogue(plan, Utc::now()).await?;
    Ok(ok(view))
}

async fn respond(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(response): Json<LearnerResponse>,
) -> Result<impl IntoResponse, AppError> {
    let reply = state
        .engine()
        .respond_dialogue(&id, response, Utc::now())
        .await?;
    Ok(ok(reply))
}

async fn end_dialogue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.engine().end_dialogue(&id, Utc::now()).await?;
    Ok(ok(summary))
}
