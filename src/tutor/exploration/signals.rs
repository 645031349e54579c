use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{AttemptCategory, ExplorationSession};
use crate::tutor::config::ExplorationConfig;
use crate::tutor::types::clamp01;

const RAPID_WEIGHT: f64 = 0.3;
const STAGNATION_WEIGHT: f64 = 0.25;
const CREATIVITY_DECLINE_WEIGHT: f64 = 0.2;
const IDLE_SHORT_PENALTY: f64 = 0.15;
const IDLE_LONG_PENALTY: f64 = 0.25;
const IDLE_SHORT_MINUTES: f64 = 5.0;
const IDLE_LONG_MINUTES: f64 = 10.0;
const TREND_WINDOW: usize = 3;

const COMPONENT_WEIGHT: f64 = 0.25;
const SWEET_SPOT_LOW: f64 = 0.2;
const SWEET_SPOT_HIGH: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Continue = 0,
    Hint = 1,
    GuidedQuestion = 2,
    Consolidate = 3,
}

impl SupportLevel {
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldingDecision {
    pub level: u8,
    pub support: SupportLevel,
    pub reason: String,
    pub message: String,
    pub frustration_level: f64,
    pub elapsed_minutes: f64,
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 60_000.0).max(0.0)
}

/// Time spent on the problem: the larger of wall-clock time since the start
/// and the summed attempt durations.
pub fn elapsed_minutes(session: &ExplorationSession, now: DateTime<Utc>) -> f64 {
    let wall = minutes_between(session.started_at, now);
    let worked = session.total_attempt_ms() as f64 / 60_000.0;
    wall.max(worked)
}

pub fn detect_frustration_level(
    session: &ExplorationSession,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> f64 {
    let attempts = &session.attempts;
    let mut level = 0.0;

    if !attempts.is_empty() {
        let rapid = attempts
            .iter()
            .filter(|a| a.duration_ms < config.rapid_attempt_ms)
            .count();
        level += RAPID_WEIGHT * rapid as f64 / attempts.len() as f64;
    }

    let window = &attempts[attempts.len().saturating_sub(TREND_WINDOW)..];
    if let Some(last) = window.last() {
        if window.len() >= 2 && last.category != AttemptCategory::Correct {
            let repeats = window
                .iter()
                .rev()
                .skip(1)
                .filter(|a| a.category == last.category)
                .count();
            level += STAGNATION_WEIGHT * repeats as f64 / (TREND_WINDOW - 1) as f64;
        }
    }

    if let (Some(first), Some(last)) = (window.first(), window.last()) {
        let decline = (first.creativity_score - last.creativity_score).max(0.0);
        level += CREATIVITY_DECLINE_WEIGHT * (decline / 0.5).min(1.0);
    }

    let idle = minutes_between(session.last_activity_at(), now);
    if idle > IDLE_LONG_MINUTES {
        level += IDLE_LONG_PENALTY;
    } else if idle > IDLE_SHORT_MINUTES {
        level += IDLE_SHORT_PENALTY;
    }

    clamp01(level)
}

fn sweet_spot_credit(frustration: f64) -> f64 {
    let f = clamp01(frustration);
    let distance = if f < SWEET_SPOT_LOW {
        SWEET_SPOT_LOW - f
    } else if f > SWEET_SPOT_HIGH {
        f - SWEET_SPOT_HIGH
    } else {
        0.0
    };
    COMPONENT_WEIGHT * clamp01(1.0 - distance / SWEET_SPOT_HIGH)
}

/// How productive the struggle has been so far: diverse approaches, rising
/// creativity, mostly productive attempts and moderate frustration.
pub fn calculate_productive_struggle_score(session: &ExplorationSession, frustration: f64) -> f64 {
    let attempts = &session.attempts;
    if attempts.is_empty() {
        return 0.0;
    }
    let n = attempts.len() as f64;

    let distinct: HashSet<AttemptCategory> = attempts.iter().map(|a| a.category).collect();
    let diversity = COMPONENT_WEIGHT * (distinct.len() as f64 / 3.0).min(1.0);

    let trend = match (attempts.first(), attempts.last()) {
        (Some(first), Some(last)) if attempts.len() >= 2 => {
            clamp01(0.5 + (last.creativity_score - first.creativity_score))
        }
        (_, Some(only)) => clamp01(only.creativity_score),
        _ => 0.0,
    };
    let creativity = COMPONENT_WEIGHT * trend;

    let productive = attempts.iter().filter(|a| a.category.is_productive()).count() as f64;
    let productive_share = COMPONENT_WEIGHT * productive / n;

    clamp01(diversity + creativity + productive_share + sweet_spot_credit(frustration))
}

pub fn support_message(support: SupportLevel, session: &ExplorationSession) -> String {
    let problem = &session.problem;
    match support {
        SupportLevel::Continue => "Keep exploring. Try a different way of looking at the problem.".to_string(),
        SupportLevel::Hint => match problem.key_ideas.first() {
            Some(idea) => format!("Here's a nudge: think about how {idea} might help."),
            None => "Here's a nudge: what do you already know that looks similar?".to_string(),
        },
        SupportLevel::GuidedQuestion => format!(
            "Let's step back. What would change if you focused on just one part of \"{}\"?",
            problem.title
        ),
        SupportLevel::Consolidate => {
            "Great effort. Let's look at your attempts together and compare them with a worked solution."
                .to_string()
        }
    }
}

pub fn get_scaffolding_level(
    session: &ExplorationSession,
    config: &ExplorationConfig,
    now: DateTime<Utc>,
) -> ScaffoldingDecision {
    let frustration = detect_frustration_level(session, config, now);
    let elapsed = elapsed_minutes(session, session.ended_at.unwrap_or(now));
    let attempts = &session.attempts;
    let threshold = session.problem.frustration_threshold_minutes;

    let last_two_unproductive = attempts.len() >= 2
        && attempts[attempts.len() - 2..]
            .iter()
            .all(|a| !a.category.is_productive());

    let (support, reason) = if !session.is_exploring() {
        (SupportLevel::Consolidate, "session is closed".to_string())
    } else if frustration > config.consolidate_frustration {
        (
            SupportLevel::Consolidate,
            format!("frustration {frustration:.2} is too high to keep exploring"),
        )
    } else if elapsed > threshold {
        (
            SupportLevel::Consolidate,
            format!("{elapsed:.1} minutes spent, past the {threshold:.0} minute limit"),
        )
    } else if attempts.len() >= session.problem.max_attempts {
        (
            SupportLevel::Consolidate,
            format!("all {} attempts used", session.problem.max_attempts),
        )
    } else if last_two_unproductive && elapsed >= config.guided_question_minutes {
        (
            SupportLevel::GuidedQuestion,
            "last two attempts were not productive".to_string(),
        )
    } else if frustration > config.hint_frustration && !attempts.is_empty() {
        (
            SupportLevel::Hint,
            format!("frustration {frustration:.2} is rising"),
        )
    } else {
        (SupportLevel::Continue, "productive exploration".to_string())
    };

    ScaffoldingDecision {
        level: support.level(),
        support,
        message: support_message(support, session),
        reason,
        frustration_level: frustration,
        elapsed_minutes: elapsed,
    }
}

#[cfg(test)]
mod tests {
    use crate::tutor::exploration::session::fixtures::{attempt, fractions_problem};
    use crate::tutor::exploration::session::{start_exploration, ExplorationAttempt, ExplorationStatus};
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn session_with(attempts: Vec<ExplorationAttempt>) -> ExplorationSession {
        let mut session = start_exploration(fractions_problem(), None, &ExplorationConfig::default(), t0());
        session.attempts = attempts;
        session
    }

    #[test]
    fn three_off_track_attempts_over_threshold_consolidate() {
        let config = ExplorationConfig::default();
        let session = session_with(vec![
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0() + Duration::minutes(4)),
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0() + Duration::minutes(8)),
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0() + Duration::minutes(12)),
        ]);
        let decision = get_scaffolding_level(&session, &config, t0() + Duration::minutes(12));
        assert_eq!(decision.level, 3);
        assert_eq!(decision.support, SupportLevel::Consolidate);
    }

    #[test]
    fn attempts_stamped_before_start_stay_in_range() {
        let config = ExplorationConfig::default();
        let mut long = attempt(AttemptCategory::CommonMisconception, 0.9, 0, t0() - Duration::days(2));
        long.duration_ms = u64::MAX;
        let session = session_with(vec![
            attempt(AttemptCategory::OffTrack, 0.9, 0, t0() - Duration::days(3)),
            long,
        ]);
        let frustration = detect_frustration_level(&session, &config, t0() - Duration::days(1));
        assert!((0.0..=1.0).contains(&frustration));
        let decision = get_scaffolding_level(&session, &config, t0());
        assert!(decision.elapsed_minutes.is_finite());
        assert_eq!(decision.support, SupportLevel::Consolidate);
    }

    #[test]
    fn summed_durations_count_even_when_clock_is_behind() {
        let config = ExplorationConfig::default();
        let session = session_with(vec![
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0()),
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0()),
            attempt(AttemptCategory::OffTrack, 0.2, 4, t0()),
        ]);
        let decision = get_scaffolding_level(&session, &config, t0() + Duration::minutes(1));
        assert!(decision.elapsed_minutes >= 12.0);
        assert_eq!(decision.level, 3);
    }

    #[test]
    fn fresh_session_continues() {
        let config = ExplorationConfig::default();
        let session = session_with(Vec::new());
        let decision = get_scaffolding_level(&session, &config, t0() + Duration::minutes(1));
        assert_eq!(decision.support, SupportLevel::Continue);
        assert_eq!(detect_frustration_level(&session, &config, t0()), 0.0);
        assert_eq!(calculate_productive_struggle_score(&session, 0.0), 0.0);
    }

    #[test]
    fn unproductive_pair_gets_guided_question() {
        let config = ExplorationConfig::default();
        let session = session_with(vec![
            attempt(AttemptCategory::CommonMisconception, 0.4, 3, t0() + Duration::minutes(3)),
            attempt(AttemptCategory::OffTrack, 0.4, 3, t0() + Duration::minutes(6)),
        ]);
        let decision = get_scaffolding_level(&session, &config, t0() + Duration::minutes(6));
        assert_eq!(decision.support, SupportLevel::GuidedQuestion);
    }

    #[test]
    fn rapid_stagnant_attempts_raise_frustration() {
        let config = ExplorationConfig::default();
        let rapid = |minute: i64| {
            let mut a = attempt(AttemptCategory::OffTrack, 0.8 - 0.3 * minute as f64, 0, t0() + Duration::minutes(minute));
            a.duration_ms = 10_000;
            a
        };
        let session = session_with(vec![rapid(0), rapid(1), rapid(2)]);
        let frustration = detect_frustration_level(&session, &config, t0() + Duration::minutes(2));
        // rapid 0.3 + stagnation 0.25 + creativity decline 0.2
        assert!((frustration - 0.75).abs() < 1e-9);
        let decision = get_scaffolding_level(&session, &config, t0() + Duration::minutes(2));
        assert_eq!(decision.support, SupportLevel::Hint);
    }

    #[test]
    fn idle_time_adds_frustration() {
        let config = ExplorationConfig::default();
        let session = session_with(Vec::new());
        assert!((detect_frustration_level(&session, &config, t0() + Duration::minutes(7)) - 0.15).abs() < 1e-12);
        assert!((detect_frustration_level(&session, &config, t0() + Duration::minutes(11)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn varied_productive_struggle_scores_high() {
        let session = session_with(vec![
            attempt(AttemptCategory::CreativeWrong, 0.4, 3, t0()),
            attempt(AttemptCategory::CommonMisconception, 0.5, 3, t0()),
            attempt(AttemptCategory::PartiallyCorrect, 0.8, 3, t0()),
        ]);
        let score = calculate_productive_struggle_score(&session, 0.3);
        assert!(score > 0.8);
        assert!(score <= 1.0);
    }

    #[test]
    fn closed_session_reports_consolidate() {
        let config = ExplorationConfig::default();
        let mut session = session_with(Vec::new());
        session.status = ExplorationStatus::EndedEarly;
        assert_eq!(get_scaffolding_level(&session, &config, t0()).level, 3);
    }
}
