use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tutor::config::BktConfig;
use crate::tutor::types::{
    LearnerSkillState, MasteryStatus, PracticeAttempt, MAX_P_MASTERY, MIN_EASE_FACTOR,
    MIN_P_MASTERY,
};

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BktParams {
    #[serde(rename = "pL0")]
    pub p_l0: f64,
    #[serde(rename = "pT")]
    pub p_t: f64,
    #[serde(rename = "pS")]
    pub p_s: f64,
    #[serde(rename = "pG")]
    pub p_g: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            p_l0: 0.3,
            p_t: 0.1,
            p_s: 0.1,
            p_g: 0.2,
        }
    }
}

impl BktParams {
    pub fn new(p_l0: f64, p_t: f64, p_s: f64, p_g: f64) -> Self {
        Self { p_l0, p_t, p_s, p_g }
    }

    /// Slip and guess must stay below 0.5, otherwise "knows the skill" and
    /// "does not know the skill" become interchangeable.
    pub fn is_identifiable(&self) -> bool {
        let in_range = [self.p_l0, self.p_t, self.p_s, self.p_g]
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p));
        in_range && self.p_s < 0.5 && self.p_g < 0.5
    }

    /// Probability of a correct answer given the current mastery estimate.
    pub fn p_correct(&self, p_mastery: f64) -> f64 {
        let p = clamp_mastery(p_mastery);
        p * (1.0 - self.p_s) + (1.0 - p) * self.p_g
    }
}

pub fn clamp_mastery(p: f64) -> f64 {
    if p.is_nan() {
        return MIN_P_MASTERY;
    }
    p.clamp(MIN_P_MASTERY, MAX_P_MASTERY)
}

pub fn bkt_posterior(p_mastery: f64, is_correct: bool, params: &BktParams) -> f64 {
    let p = clamp_mastery(p_mastery);
    let (num, denom) = if is_correct {
        let num = p * (1.0 - params.p_s);
        (num, num + (1.0 - p) * params.p_g)
    } else {
        let num = p * params.p_s;
        (num, num + (1.0 - p) * (1.0 - params.p_g))
    };
    if denom <= EPS {
        return p;
    }
    num / denom
}

/// One BKT step: evidence posterior, then the learning transition.
///
/// The transition after an incorrect answer is capped at the prior so that
/// a wrong answer can never raise the estimate.
pub fn bkt_update(p_mastery: f64, is_correct: bool, params: &BktParams) -> f64 {
    let prior = clamp_mastery(p_mastery);
    let posterior = bkt_posterior(prior, is_correct, params);
    let learned = posterior + (1.0 - posterior) * params.p_t.clamp(0.0, 1.0);
    let next = if is_correct { learned } else { learned.min(prior) };
    clamp_mastery(next)
}

pub fn mastery_status(state: &LearnerSkillState, threshold: f64) -> MasteryStatus {
    if state.attempt_count == 0 {
        MasteryStatus::NotStarted
    } else if state.p_mastery >= threshold {
        MasteryStatus::Mastered
    } else {
        MasteryStatus::Learning
    }
}

/// Replays outcomes in order from `params.p_l0`; entry `i` is the mastery
/// estimate before outcome `i`. Fitting and validation both score against
/// this trace.
pub fn trace_outcomes(params: &BktParams, outcomes: &[bool]) -> Vec<f64> {
    outcomes
        .iter()
        .scan(clamp_mastery(params.p_l0), |p, &is_correct| {
            let before = *p;
            *p = bkt_update(before, is_correct, params);
            Some(before)
        })
        .collect()
}

/// Outcomes of `attempts` in timestamp order.
pub(crate) fn sorted_outcomes(attempts: &[PracticeAttempt]) -> Vec<bool> {
    let mut ordered: Vec<&PracticeAttempt> = attempts.iter().collect();
    ordered.sort_by_key(|a| a.timestamp);
    ordered.iter().map(|a| a.is_correct).collect()
}

fn recall_quality(attempt: &PracticeAttempt) -> f64 {
    match (attempt.is_correct, attempt.hints_used) {
        (true, 0) => 5.0,
        (true, _) => 4.0,
        (false, _) => 1.0,
    }
}

fn next_ease_factor(ease: f64, quality: f64) -> f64 {
    let miss = 5.0 - quality;
    (ease + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR)
}

fn review_interval_days(consecutive_correct: u32, ease: f64, max_days: f64) -> f64 {
    let days = match consecutive_correct {
        0 | 1 => 1.0,
        2 => 6.0,
        n => 6.0 * ease.powi(n as i32 - 2),
    };
    days.min(max_days)
}

/// Applies one practice attempt to a learner/skill state and returns the new
/// state. Scaffold level is left untouched; see `recommend::scaffold`.
pub fn update_mastery(
    state: &LearnerSkillState,
    attempt: &PracticeAttempt,
    params: &BktParams,
    config: &BktConfig,
) -> LearnerSkillState {
    let mut next = state.clone();
    next.p_mastery = bkt_update(state.p_mastery, attempt.is_correct, params);
    next.attempt_count = state.attempt_count.saturating_add(1);

    if attempt.is_correct {
        next.correct_count = state.correct_count.saturating_add(1);
        next.consecutive_correct = state.consecutive_correct.saturating_add(1);
        next.consecutive_incorrect = 0;
    } else {
        next.consecutive_correct = 0;
        next.consecutive_incorrect = state.consecutive_incorrect.saturating_add(1);
    }

    next.ease_factor = next_ease_factor(state.ease_factor.max(MIN_EASE_FACTOR), recall_quality(attempt));
    let interval_days = review_interval_days(
        next.consecutive_correct,
        next.ease_factor,
        config.max_review_interval_days,
    );
    next.next_review_at = Some(add_days(attempt.timestamp, interval_days));
    next.last_practiced_at = Some(
        state
            .last_practiced_at
            .map_or(attempt.timestamp, |prev| prev.max(attempt.timestamp)),
    );

    debug!(
        learner_id = %state.learner_id,
        skill_id = %state.skill_id,
        is_correct = attempt.is_correct,
        before = state.p_mastery,
        after = next.p_mastery,
        "mastery updated"
    );

    next
}

fn add_days(at: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let seconds = (days * 86_400.0).round() as i64;
    at + Duration::seconds(seconds)
}
