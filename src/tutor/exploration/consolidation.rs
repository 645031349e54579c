use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{AttemptCategory, ExplorationError, ExplorationSession, ExplorationStatus};
use super::signals::{calculate_productive_struggle_score, detect_frustration_level};
use crate::tutor::config::ExplorationConfig;
use crate::tutor::types::clamp01;

const GAIN_FROM_STRUGGLE: f64 = 0.8;
const BASE_GAIN: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReview {
    pub attempt_number: usize,
    pub category: AttemptCategory,
    pub what_was_right: Vec<String>,
    pub what_was_missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_to_solution: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consolidation {
    pub session_id: String,
    pub problem_id: String,
    pub attempt_reviews: Vec<AttemptReview>,
    pub correct_solution: String,
    pub key_ideas: Vec<String>,
    pub productive_struggle_score: f64,
    pub conceptual_gain: f64,
    pub summary: String,
    pub generated_at: DateTime<Utc>,
}

fn review_attempt(session: &ExplorationSession, index: usize) -> Option<AttemptReview> {
    let attempt = session.attempts.get(index)?;
    let problem = &session.problem;

    let mut what_was_right: Vec<String> = attempt
        .partial_understanding
        .iter()
        .map(|idea| format!("You used {idea}."))
        .collect();
    if attempt.category == AttemptCategory::CreativeWrong {
        what_was_right.push("You tried an original approach.".to_string());
    }

    let mut what_was_missing: Vec<String> = problem
        .key_ideas
        .iter()
        .filter(|idea| !attempt.partial_understanding.contains(idea))
        .map(|idea| format!("The solution relies on {idea}."))
        .collect();
    what_was_missing.extend(
        attempt
            .misconceptions
            .iter()
            .map(|m| format!("Watch out: \"{m}\" is a common misconception.")),
    );

    let link_to_solution = (!attempt.partial_understanding.is_empty()).then(|| {
        format!(
            "Your idea of {} is exactly where the worked solution starts: {}",
            attempt.partial_understanding.join(" and "),
            problem.correct_solution
        )
    });

    Some(AttemptReview {
        attempt_number: index + 1,
        category: attempt.category,
        what_was_right,
        what_was_missing,
        link_to_solution,
    })
}

/// Reviews every attempt against the worked solution and closes the session.
/// A session that is already consolidated returns its stored result.
pub fn generate_consolidation(
    session: &mut ExplorationSession,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> Result<Consolidation, ExplorationError> {
    if let Some(existing) = session.consolidation.as_ref() {
        if session.status == ExplorationStatus::Consolidated {
            return Ok(existing.clone());
        }
    }
    session.ensure_exploring()?;

    session.frustration_level = detect_frustration_level(session, config, now);
    let struggle = calculate_productive_struggle_score(session, session.frustration_level);
    session.productive_struggle_score = struggle;

    let attempt_reviews: Vec<AttemptReview> = (0..session.attempts.len())
        .filter_map(|i| review_attempt(session, i))
        .collect();
    let productive = session
        .attempts
        .iter()
        .filter(|a| a.category.is_productive())
        .count();

    let consolidation = Consolidation {
        session_id: session.id.clone(),
        problem_id: session.problem.id.clone(),
        attempt_reviews,
        correct_solution: session.problem.correct_solution.clone(),
        key_ideas: session.problem.key_ideas.clone(),
        productive_struggle_score: struggle,
        conceptual_gain: clamp01(struggle * GAIN_FROM_STRUGGLE + BASE_GAIN),
        summary: format!(
            "You made {} attempt(s), {} of them productive. Here is how they connect to the solution.",
            session.attempts.len(),
            productive
        ),
        generated_at: now,
    };

    session.status = ExplorationStatus::Consolidated;
    session.ready_for_consolidation = true;
    session.ended_at = Some(now);
    session.consolidation = Some(consolidation.clone());

    Ok(consolidation)
}
