use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::consolidation::Consolidation;
use super::signals::{
    calculate_productive_struggle_score, detect_frustration_level, elapsed_minutes,
    get_scaffolding_level, ScaffoldingDecision, SupportLevel,
};
use crate::tutor::config::ExplorationConfig;
use crate::tutor::types::{clamp01, TutorError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub concept: String,
    /// Zero means "use the configured default".
    #[serde(default)]
    pub max_attempts: usize,
    #[serde(default)]
    pub frustration_threshold_minutes: f64,
    pub correct_solution: String,
    #[serde(default)]
    pub key_ideas: Vec<String>,
    #[serde(default)]
    pub known_misconceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptCategory {
    Correct,
    PartiallyCorrect,
    CreativeWrong,
    CommonMisconception,
    OffTrack,
}

impl AttemptCategory {
    /// Attempts that move the learner toward the solution or open a new line
    /// of thought.
    pub fn is_productive(&self) -> bool {
        matches!(self, Self::Correct | Self::PartiallyCorrect | Self::CreativeWrong)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::PartiallyCorrect => "partially_correct",
            Self::CreativeWrong => "creative_wrong",
            Self::CommonMisconception => "common_misconception",
            Self::OffTrack => "off_track",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationAttempt {
    #[serde(default)]
    pub approach: String,
    pub category: AttemptCategory,
    #[serde(default)]
    pub partial_understanding: Vec<String>,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    pub creativity_score: f64,
    pub duration_ms: u64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStatus {
    Exploring,
    Consolidated,
    EndedEarly,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExplorationError {
    #[error("exploration {id} is closed ({status:?})")]
    Closed { id: String, status: ExplorationStatus },
    #[error("exploration {id} already has the maximum of {max} attempts")]
    MaxAttemptsReached { id: String, max: usize },
    #[error("attempt duration {duration_ms} ms exceeds the {max_ms} ms limit")]
    DurationOutOfRange { duration_ms: u64, max_ms: u64 },
}

impl From<ExplorationError> for TutorError {
    fn from(err: ExplorationError) -> Self {
        match err {
            ExplorationError::DurationOutOfRange { .. } => TutorError::InvalidInput(err.to_string()),
            _ => TutorError::InvalidTransition(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationSession {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
    pub problem: Problem,
    pub attempts: Vec<ExplorationAttempt>,
    pub frustration_level: f64,
    pub productive_struggle_score: f64,
    pub ready_for_consolidation: bool,
    pub started_at: DateTime<Utc>,
    pub status: ExplorationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<Consolidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExplorationSession {
    pub fn is_exploring(&self) -> bool {
        self.status == ExplorationStatus::Exploring
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.attempts
            .last()
            .map(|a| a.submitted_at)
            .unwrap_or(self.started_at)
            .max(self.started_at)
    }

    pub fn total_attempt_ms(&self) -> u64 {
        self.attempts
            .iter()
            .map(|a| a.duration_ms)
            .fold(0u64, u64::saturating_add)
    }

    pub(crate) fn ensure_exploring(&self) -> Result<(), ExplorationError> {
        if self.is_exploring() {
            Ok(())
        } else {
            Err(ExplorationError::Closed {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationSummary {
    pub session_id: String,
    pub problem_id: String,
    pub status: ExplorationStatus,
    pub attempt_count: usize,
    pub productive_attempts: usize,
    pub best_category: Option<AttemptCategory>,
    pub frustration_level: f64,
    pub productive_struggle_score: f64,
    pub elapsed_minutes: f64,
    pub consolidated: bool,
}

pub fn start_exploration(
    mut problem: Problem,
    learner_id: Option<String>,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> ExplorationSession {
    if problem.max_attempts == 0 {
        problem.max_attempts = config.default_max_attempts.max(1);
    }
    if problem.frustration_threshold_minutes.is_nan() || problem.frustration_threshold_minutes <= 0.0 {
        problem.frustration_threshold_minutes = config.default_frustration_threshold_minutes;
    }

    ExplorationSession {
        id: Uuid::new_v4().to_string(),
        learner_id,
        problem,
        attempts: Vec::new(),
        frustration_level: 0.0,
        productive_struggle_score: 0.0,
        ready_for_consolidation: false,
        started_at: now,
        status: ExplorationStatus::Exploring,
        consolidation: None,
        ended_at: None,
    }
}

/// Appends an attempt and refreshes the session signals. Nothing changes
/// when the attempt is rejected.
pub fn record_attempt(
    session: &mut ExplorationSession,
    mut attempt: ExplorationAttempt,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> Result<ScaffoldingDecision, ExplorationError> {
    session.ensure_exploring()?;
    if session.attempts.len() >= session.problem.max_attempts {
        return Err(ExplorationError::MaxAttemptsReached {
            id: session.id.clone(),
            max: session.problem.max_attempts,
        });
    }
    if attempt.duration_ms > config.max_attempt_duration_ms {
        return Err(ExplorationError::DurationOutOfRange {
            duration_ms: attempt.duration_ms,
            max_ms: config.max_attempt_duration_ms,
        });
    }

    attempt.creativity_score = clamp01(attempt.creativity_score);
    tracing::debug!(
        session_id = %session.id,
        category = attempt.category.as_str(),
        creativity = attempt.creativity_score,
        "exploration attempt recorded"
    );
    session.attempts.push(attempt);

    Ok(tick_exploration(session, config, now))
}

/// Refreshes frustration, struggle and readiness. Callers invoke this on
/// their own schedule in place of a background timer.
pub fn tick_exploration(
    session: &mut ExplorationSession,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> ScaffoldingDecision {
    if !session.is_exploring() {
        return get_scaffolding_level(session, config, now);
    }
    session.frustration_level = detect_frustration_level(session, config, now);
    session.productive_struggle_score =
        calculate_productive_struggle_score(session, session.frustration_level);
    let decision = get_scaffolding_level(session, config, now);
    session.ready_for_consolidation = decision.support == SupportLevel::Consolidate;
    decision
}

pub fn summarize_exploration(session: &ExplorationSession, now: DateTime<Utc>) -> ExplorationSummary {
    let end = session.ended_at.unwrap_or(now);
    ExplorationSummary {
        session_id: session.id.clone(),
        problem_id: session.problem.id.clone(),
        status: session.status,
        attempt_count: session.attempts.len(),
        productive_attempts: session.attempts.iter().filter(|a| a.category.is_productive()).count(),
        best_category: session
            .attempts
            .iter()
            .map(|a| a.category)
            .min_by_key(|c| *c as u8),
        frustration_level: session.frustration_level,
        productive_struggle_score: session.productive_struggle_score,
        elapsed_minutes: elapsed_minutes(session, end),
        consolidated: session.consolidation.is_some(),
    }
}

/// Closes an exploring session. Already closed sessions are left as they are.
pub fn end_exploration_early(session: &mut ExplorationSession, now: DateTime<Utc>) -> ExplorationSummary {
    if session.is_exploring() {
        session.status = ExplorationStatus::EndedEarly;
        session.ended_at = Some(now);
        tracing::info!(session_id = %session.id, attempts = session.attempts.len(), "exploration ended early");
    }
    summarize_exploration(session, now)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn fractions_problem() -> Problem {
        Problem {
            id: "p1".to_string(),
            title: "Comparing fractions".to_string(),
            description: "Which is larger, 3/4 or 5/8? Explain how you know.".to_string(),
            concept: "comparing fractions".to_string(),
            max_attempts: 5,
            frustration_threshold_minutes: 10.0,
            correct_solution: "Convert both to a common denominator: 3/4 = 6/8, and 6/8 is larger than 5/8."
                .to_string(),
            key_ideas: vec!["common denominator".to_string(), "equivalent fractions".to_string()],
            known_misconceptions: vec!["bigger denominator means bigger fraction".to_string()],
        }
    }

    pub fn attempt(category: AttemptCategory, creativity: f64, minutes: u64, at: DateTime<Utc>) -> ExplorationAttempt {
        ExplorationAttempt {
            approach: String::new(),
            category,
            partial_understanding: Vec::new(),
            misconceptions: Vec::new(),
            creativity_score: creativity,
            duration_ms: minutes * 60_000,
            submitted_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn start_fills_defaults() {
        let mut problem = fractions_problem();
        problem.max_attempts = 0;
        problem.frustration_threshold_minutes = 0.0;
        let session = start_exploration(problem, None, &ExplorationConfig::default(), t0());
        assert_eq!(session.problem.max_attempts, 5);
        assert_eq!(session.problem.frustration_threshold_minutes, 10.0);
        assert!(session.is_exploring());
    }

    #[test]
    fn recorded_attempt_reads_back_unchanged() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        let attempt = attempt(AttemptCategory::CreativeWrong, 0.65, 2, t0() + Duration::minutes(2));
        record_attempt(&mut session, attempt.clone(), &config, t0() + Duration::minutes(2)).unwrap();
        assert_eq!(session.attempts[0], attempt);
    }

    #[test]
    fn out_of_range_creativity_is_clamped() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        record_attempt(&mut session, attempt(AttemptCategory::OffTrack, 3.0, 1, t0()), &config, t0()).unwrap();
        assert_eq!(session.attempts[0].creativity_score, 1.0);
    }

    #[test]
    fn max_attempts_is_enforced() {
        let config = ExplorationConfig::default();
        let mut problem = fractions_problem();
        problem.max_attempts = 2;
        let mut session = start_exploration(problem, None, &config, t0());
        for i in 0..2 {
            let at = t0() + Duration::minutes(i + 1);
            record_attempt(&mut session, attempt(AttemptCategory::PartiallyCorrect, 0.5, 1, at), &config, at).unwrap();
        }
        let err = record_attempt(&mut session, attempt(AttemptCategory::Correct, 0.5, 1, t0()), &config, t0()).unwrap_err();
        assert!(matches!(err, ExplorationError::MaxAttemptsReached { max: 2, .. }));
        assert_eq!(session.attempts.len(), 2);
    }

    #[test]
    fn oversized_duration_is_rejected_without_change() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        let mut long = attempt(AttemptCategory::OffTrack, 0.2, 1, t0());
        long.duration_ms = u64::MAX / 2 + 1;
        let err = record_attempt(&mut session, long, &config, t0()).unwrap_err();
        assert!(matches!(err, ExplorationError::DurationOutOfRange { .. }));
        assert!(session.attempts.is_empty());
        assert!(matches!(TutorError::from(err), TutorError::InvalidInput(_)));
    }

    #[test]
    fn summed_durations_saturate() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        for _ in 0..2 {
            let mut a = attempt(AttemptCategory::OffTrack, 0.2, 1, t0());
            a.duration_ms = u64::MAX / 2 + 1;
            session.attempts.push(a);
        }
        assert_eq!(session.total_attempt_ms(), u64::MAX);
        let decision = tick_exploration(&mut session, &config, t0());
        assert_eq!(decision.support, SupportLevel::Consolidate);
        assert!((0.0..=1.0).contains(&session.frustration_level));
    }

    #[test]
    fn attempt_before_start_counts_from_start() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        let early = attempt(AttemptCategory::PartiallyCorrect, 0.5, 1, t0() - Duration::hours(3));
        record_attempt(&mut session, early, &config, t0()).unwrap();
        assert_eq!(session.last_activity_at(), t0());
        let summary = summarize_exploration(&session, t0());
        assert!((summary.elapsed_minutes - 1.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&session.frustration_level));
    }

    #[test]
    fn ended_session_rejects_attempts() {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(fractions_problem(), None, &config, t0());
        let summary = end_exploration_early(&mut session, t0() + Duration::minutes(1));
        assert_eq!(summary.status, ExplorationStatus::EndedEarly);
        assert_eq!(summary.attempt_count, 0);
        let err = record_attempt(&mut session, attempt(AttemptCategory::Correct, 0.5, 1, t0()), &config, t0());
        assert!(matches!(err, Err(ExplorationError::Closed { .. })));
    }
}
