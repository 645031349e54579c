use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::tutor::difficulties::VariationType;
use crate::tutor::engine::InterleaveRequest;

const MAX_BUDGET: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/interleave", post(interleave))
        .route("/retrieval-strength", post(retrieval_strength))
        .route("/effectiveness", post(effectiveness))
        .route("/variation", post(variation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalStrengthRequest {
    is_correct: bool,
    #[serde(default)]
    response_time_ms: Option<u64>,
    #[serde(default)]
    hints_used: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalStrengthDto {
    strength: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectivenessRequest {
    pre_score: f64,
    post_score: f64,
    elapsed_days: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariationRequest {
    #[serde(default)]
    history: Vec<VariationType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VariationDto {
    variation: VariationType,
    description: &'static str,
}

async fn interleave(
    State(state): State<AppState>,
    Json(payload): Json<InterleaveRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.budget == 0 || payload.budget > MAX_BUDGET {
        return Err(AppError::validation(format!(
            "budget must be between 1 and {MAX_BUDGET}"
        )));
    }
    Ok(ok(state.engine().interleave(&payload)))
}

async fn retrieval_strength(
    State(state): State<AppState>,
    Json(payload): Json<RetrievalStrengthRequest>,
) -> impl IntoResponse {
    let strength = state.engine().retrieval_strength(
        payload.is_correct,
        payload.response_time_ms,
        payload.hints_used,
    );
    ok(RetrievalStrengthDto { strength })
}

async fn effectiveness(
    State(state): State<AppState>,
    Json(payload): Json<EffectivenessRequest>,
) -> Result<impl IntoResponse, AppError> {
    if ![payload.pre_score, payload.post_score, payload.elapsed_days]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(AppError::validation("scores and elapsedDays must be finite numbers"));
    }
    Ok(ok(state.engine().effectiveness(
        payload.pre_score,
        payload.post_score,
        payload.elapsed_days,
    )))
}

async fn variation(
    State(state): State<AppState>,
    Json(payload): Json<VariationRequest>,
) -> impl IntoResponse {
    let variation = state.engine().next_variation(&payload.history);
    ok(VariationDto {
        variation,
        description: variation.describe(),
    })
}
