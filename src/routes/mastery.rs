use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::engine::PracticeInput;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attempts", post(record_attempt))
        .route("/validate", post(validate))
        .route("/fit", post(fit_all))
        .route("/skills/:skill_id/fit", post(fit_skill))
        .route("/:learner_id/:skill_id", get(get_mastery))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    #[serde(default)]
    skill_ids: Vec<String>,
}

async fn record_attempt(
    State(state): State<AppState>,
    Json(payload): Json<PracticeInput>,
) -> Result<impl IntoResponse, AppError> {
    if payload.learner_id.trim().is_empty() || payload.skill_id.trim().is_empty() {
        return Err(AppError::validation("learnerId and skillId are required"));
    }
    let outcome = state.engine().record_practice(payload, Utc::now()).await?;
    Ok(ok(outcome))
}

async fn get_mastery(
    State(state): State<AppState>,
    Path((learner_id, skill_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let estimate = state.engine().mastery_estimate(&learner_id, &skill_id)?;
    Ok(ok(estimate))
}

async fn fit_skill(
    State(state): State<AppState>,
    Path(skill_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.engine().fit_skill(skill_id.trim())?;
    Ok(ok(result))
}

async fn fit_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let results = state.engine().fit_all()?;
    Ok(ok(results))
}

async fn validate(
    State(state): State<AppState>,
    payload: Option<Json<ValidateRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    ok(state.engine().validate(&request.skill_ids))
}
