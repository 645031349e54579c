use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::engine::AttemptSubmission;
use crate::tutor::exploration::Problem;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_exploration))
        .route("/:id/attempts", post(submit_attempt))
        .route("/:id/scaffolding", get(scaffolding))
        .route("/:id/consolidate", post(consolidate))
        .route("/:id/end", post(end_exploration))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExplorationRequest {
    #[serde(default)]
    learner_id: Option<String>,
    problem: Problem,
}

async fn start_exploration(
    State(state): State<AppState>,
    Json(payload): Json<StartExplorationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.problem.id.trim().is_empty() {
        return Err(AppError::validation("problem.id is required"));
    }
    let session = state
        .engine()
        .start_exploration(payload.problem, payload.learner_id, Utc::now())?;
    Ok(ok(session))
}

async fn submit_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(submission): Json<AttemptSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let feedback = state
        .engine()
        .submit_attempt(&id, submission, Utc::now())
        .await?;
    Ok(ok(feedback))
}

async fn scaffolding(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let feedback = state.engine().scaffolding(&id, Utc::now()).await?;
    Ok(ok(feedback))
}

async fn consolidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let consolidation = state.engine().consolidate(&id, Utc::now()).await?;
    Ok(ok(consolidation))
}

async fn end_exploration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.engine().end_exploration(&id, Utc::now())?;
    Ok(ok(summary))
}
