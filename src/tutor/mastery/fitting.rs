//! Per-skill BKT parameter fitting.
//!
//! Coarse grid search over a bounded box followed by coordinate refinement
//! with step halving. The box keeps slip and guess below 0.5, and any result
//! that still fails the identifiability check is discarded in favour of the
//! previous parameters.
//!
//! With at least ten attempts the newest fifth is held out of the search and
//! the reported Brier score measures how well the fit predicts it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bkt::{sorted_outcomes, trace_outcomes, BktParams};
use crate::tutor::config::BktConfig;
use crate::tutor::types::PracticeAttempt;

const P_FLOOR: f64 = 1e-6;
const INITIAL_STEP: f64 = 0.05;
const HOLDOUT_MIN_ATTEMPTS: usize = 10;
// Held-out share is 1 / HOLDOUT_DIVISOR, rounded up.
const HOLDOUT_DIVISOR: usize = 5;

// (lower, upper) per coordinate, in [pL0, pT, pS, pG] order.
const BOUNDS: [(f64, f64); 4] = [(0.05, 0.95), (0.01, 0.5), (0.01, 0.45), (0.01, 0.45)];
const GRID_POINTS: [usize; 4] = [10, 8, 8, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitQuality {
    Poor,
    Fair,
    Good,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitOutcome {
    Fitted,
    InsufficientData,
    NotIdentifiable,
    NotConverged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BktFitResult {
    pub skill_id: String,
    pub params: BktParams,
    pub converged: bool,
    pub fit_quality: FitQuality,
    pub outcome: FitOutcome,
    pub attempt_count: usize,
    /// Newest attempts excluded from fitting and used for `brier_score`;
    /// zero means the score is in-sample.
    pub holdout_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_likelihood: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brier_score: Option<f64>,
}

impl BktFitResult {
    pub fn is_insufficient_data(&self) -> bool {
        self.outcome == FitOutcome::InsufficientData
    }

    fn rejected(
        skill_id: &str,
        previous: BktParams,
        outcome: FitOutcome,
        attempt_count: usize,
    ) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            params: previous,
            converged: false,
            fit_quality: FitQuality::Poor,
            outcome,
            attempt_count,
            holdout_count: 0,
            log_likelihood: None,
            brier_score: None,
        }
    }
}

pub fn log_likelihood(params: &BktParams, outcomes: &[bool]) -> f64 {
    trace_outcomes(params, outcomes)
        .iter()
        .zip(outcomes)
        .map(|(&p, &correct)| {
            let pc = params.p_correct(p).clamp(P_FLOOR, 1.0 - P_FLOOR);
            if correct {
                pc.ln()
            } else {
                (1.0 - pc).ln()
            }
        })
        .sum()
}

pub fn brier_score(params: &BktParams, outcomes: &[bool]) -> f64 {
    tail_brier_score(params, outcomes, outcomes.len())
}

/// Brier score of the last `tail` outcomes. Mastery is traced through the
/// whole sequence, so earlier outcomes still inform each prediction.
pub fn tail_brier_score(params: &BktParams, outcomes: &[bool], tail: usize) -> f64 {
    let tail = tail.min(outcomes.len());
    if tail == 0 {
        return 0.0;
    }
    let start = outcomes.len() - tail;
    let trace = trace_outcomes(params, outcomes);
    let total: f64 = trace[start..]
        .iter()
        .zip(&outcomes[start..])
        .map(|(&p, &correct)| {
            let target = if correct { 1.0 } else { 0.0 };
            (params.p_correct(p) - target).powi(2)
        })
        .sum();
    total / tail as f64
}

fn holdout_count(n: usize) -> usize {
    if n < HOLDOUT_MIN_ATTEMPTS {
        0
    } else {
        n.div_ceil(HOLDOUT_DIVISOR)
    }
}

fn quality_from_brier(brier: f64) -> FitQuality {
    if brier < 0.20 {
        FitQuality::Good
    } else if brier < 0.25 {
        FitQuality::Fair
    } else {
        FitQuality::Poor
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![(lo + hi) / 2.0];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| lo + step * i as f64).collect()
}

fn to_params(v: &[f64; 4]) -> BktParams {
    BktParams::new(v[0], v[1], v[2], v[3])
}

fn grid_search(outcomes: &[bool]) -> ([f64; 4], f64) {
    let axes: Vec<Vec<f64>> = BOUNDS
        .iter()
        .zip(GRID_POINTS.iter())
        .map(|(&(lo, hi), &n)| linspace(lo, hi, n))
        .collect();

    let mut best = [0.0; 4];
    let mut best_ll = f64::NEG_INFINITY;
    for &l0 in &axes[0] {
        for &t in &axes[1] {
            for &s in &axes[2] {
                for &g in &axes[3] {
                    let candidate = [l0, t, s, g];
                    let ll = log_likelihood(&to_params(&candidate), outcomes);
                    if ll > best_ll {
                        best_ll = ll;
                        best = candidate;
                    }
                }
            }
        }
    }
    (best, best_ll)
}

/// Returns the refined point, its log-likelihood, and whether the step
/// shrank below `tolerance` before the iteration cap.
fn coordinate_refine(
    outcomes: &[bool],
    start: [f64; 4],
    start_ll: f64,
    max_iterations: usize,
    tolerance: f64,
) -> ([f64; 4], f64, bool) {
    let mut best = start;
    let mut best_ll = start_ll;
    let mut step = INITIAL_STEP;

    for _ in 0..max_iterations {
        let mut improved = false;
        for (i, &(lo, hi)) in BOUNDS.iter().enumerate() {
            for direction in [1.0, -1.0] {
                let mut candidate = best;
                candidate[i] = (candidate[i] + direction * step).clamp(lo, hi);
                if candidate[i] == best[i] {
                    continue;
                }
                let ll = log_likelihood(&to_params(&candidate), outcomes);
                if ll > best_ll + 1e-12 {
                    best = candidate;
                    best_ll = ll;
                    improved = true;
                }
            }
        }
        if !improved {
            step /= 2.0;
            if step < tolerance {
                return (best, best_ll, true);
            }
        }
    }
    (best, best_ll, false)
}

/// Fits BKT parameters for one skill from its attempt history.
///
/// Fewer than `config.min_fit_attempts` attempts never fit and return the
/// previous parameters flagged as insufficient data.
pub fn fit_skill_bkt(
    skill_id: &str,
    attempts: &[PracticeAttempt],
    previous: Option<BktParams>,
    config: &BktConfig,
) -> BktFitResult {
    let previous = previous.unwrap_or(config.default_params);
    let n = attempts.len();

    if n < config.min_fit_attempts {
        debug!(skill_id, attempts = n, "not enough attempts to fit BKT");
        return BktFitResult::rejected(skill_id, previous, FitOutcome::InsufficientData, n);
    }

    let outcomes = sorted_outcomes(attempts);
    let holdout = holdout_count(n);
    let training = &outcomes[..n - holdout];
    let (grid_best, grid_ll) = grid_search(training);
    let (point, ll, converged) = coordinate_refine(
        training,
        grid_best,
        grid_ll,
        config.max_refine_iterations,
        config.refine_tolerance,
    );
    let fitted = to_params(&point);

    if !fitted.is_identifiable() {
        warn!(skill_id, ?fitted, "discarding non-identifiable BKT fit");
        return BktFitResult::rejected(skill_id, previous, FitOutcome::NotIdentifiable, n);
    }
    if !converged {
        warn!(skill_id, "BKT fit did not converge, keeping previous parameters");
        return BktFitResult::rejected(skill_id, previous, FitOutcome::NotConverged, n);
    }

    let brier = if holdout > 0 {
        tail_brier_score(&fitted, &outcomes, holdout)
    } else {
        brier_score(&fitted, &outcomes)
    };
    let fit_quality = quality_from_brier(brier);
    info!(skill_id, attempts = n, holdout, log_likelihood = ll, brier, ?fit_quality, "BKT fitted");

    BktFitResult {
        skill_id: skill_id.to_string(),
        params: fitted,
        converged: true,
        fit_quality,
        outcome: FitOutcome::Fitted,
        attempt_count: n,
        holdout_count: holdout,
        log_likelihood: Some(ll),
        brier_score: Some(brier),
    }
}

/// Groups attempts by `skill_id` and fits each skill. Attempts without a
/// skill id are ignored.
pub fn fit_skills(
    attempts: &[PracticeAttempt],
    previous: &BTreeMap<String, BktParams>,
    config: &BktConfig,
) -> BTreeMap<String, BktFitResult> {
    let mut grouped: BTreeMap<String, Vec<PracticeAttempt>> = BTreeMap::new();
    for attempt in attempts {
        if let Some(skill_id) = attempt.skill_id.as_deref() {
            grouped.entry(skill_id.to_string()).or_default().push(attempt.clone());
        }
    }

    grouped
        .into_iter()
        .map(|(skill_id, skill_attempts)| {
            let result = fit_skill_bkt(
                &skill_id,
                &skill_attempts,
                previous.get(&skill_id).copied(),
                config,
            );
            (skill_id, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn attempts(pattern: &[bool]) -> Vec<PracticeAttempt> {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        pattern
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                PracticeAttempt::new(c, base + Duration::minutes(i as i64)).for_skill("algebra")
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_never_fits() {
        let config = BktConfig::default();
        for n in 0..5 {
            let result = fit_skill_bkt("algebra", &attempts(&vec![true; n]), None, &config);
            assert!(!result.converged);
            assert!(result.is_insufficient_data());
            assert_eq!(result.params, config.default_params);
            assert_eq!(result.fit_quality, FitQuality::Poor);
        }
    }

    #[test]
    fn test_insufficient_data_keeps_previous() {
        let previous = BktParams::new(0.4, 0.2, 0.05, 0.1);
        let result = fit_skill_bkt("algebra", &attempts(&[true, false]), Some(previous), &BktConfig::default());
        assert_eq!(result.params, previous);
    }

    #[test]
    fn test_learning_curve_fit_is_identifiable() {
        let pattern = [
            false, false, true, false, true, true, true, false, true, true, true, true, true, true,
            true, true,
        ];
        let result = fit_skill_bkt("algebra", &attempts(&pattern), None, &BktConfig::default());
        assert_eq!(result.outcome, FitOutcome::Fitted);
        assert!(result.converged);
        assert!(result.params.is_identifiable());
        let brier = result.brier_score.unwrap();
        assert!((0.0..=1.0).contains(&brier));
        assert_eq!(result.fit_quality, quality_from_brier(brier));
    }

    #[test]
    fn test_fit_improves_on_defaults() {
        let pattern = [false, false, false, true, true, true, true, true, true, true, true, true];
        let outcomes = pattern.to_vec();
        let config = BktConfig::default();
        let result = fit_skill_bkt("algebra", &attempts(&pattern), None, &config);
        assert_eq!(result.holdout_count, 3);
        let training = &outcomes[..outcomes.len() - result.holdout_count];
        let default_ll = log_likelihood(&config.default_params, training);
        assert!(result.log_likelihood.unwrap() >= default_ll);
    }

    #[test]
    fn test_short_history_scores_in_sample() {
        let pattern = [false, true, false, true, true, true, true, true, true];
        let outcomes = pattern.to_vec();
        let result = fit_skill_bkt("algebra", &attempts(&pattern), None, &BktConfig::default());
        assert_eq!(result.holdout_count, 0);
        if result.outcome == FitOutcome::Fitted {
            let expected = brier_score(&result.params, &outcomes);
            assert!((result.brier_score.unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_brier_is_measured_on_held_out_tail() {
        let pattern = [
            false, false, true, false, true, true, true, false, true, true, true, true, false,
            false, false,
        ];
        let outcomes = pattern.to_vec();
        let result = fit_skill_bkt("algebra", &attempts(&pattern), None, &BktConfig::default());
        assert_eq!(result.outcome, FitOutcome::Fitted);
        assert_eq!(result.holdout_count, 3);
        let held_out = tail_brier_score(&result.params, &outcomes, 3);
        assert!((result.brier_score.unwrap() - held_out).abs() < 1e-12);
        assert!(held_out > brier_score(&result.params, &outcomes[..12]));
    }

    #[test]
    fn test_holdout_sizes() {
        assert_eq!(holdout_count(9), 0);
        assert_eq!(holdout_count(10), 2);
        assert_eq!(holdout_count(11), 3);
        assert_eq!(holdout_count(25), 5);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let config = BktConfig {
            max_refine_iterations: 0,
            ..Default::default()
        };
        let previous = BktParams::new(0.25, 0.15, 0.1, 0.2);
        let result = fit_skill_bkt("algebra", &attempts(&[true; 8]), Some(previous), &config);
        assert_eq!(result.outcome, FitOutcome::NotConverged);
        assert_eq!(result.params, previous);
        assert_eq!(result.fit_quality, FitQuality::Poor);
    }

    #[test]
    fn test_fit_skills_groups_by_skill() {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let mut all = attempts(&[true, true, false, true, true, true]);
        all.push(PracticeAttempt::new(true, base).for_skill("geometry"));
        all.push(PracticeAttempt::new(true, base));
        let results = fit_skills(&all, &BTreeMap::new(), &BktConfig::default());
        assert_eq!(results.len(), 2);
        assert!(results["geometry"].is_insufficient_data());
        assert_eq!(results["algebra"].attempt_count, 6);
    }

    #[test]
    fn test_brier_bounds() {
        let params = BktParams::default();
        let b = brier_score(&params, &[true, false, true]);
        assert!((0.0..=1.0).contains(&b));
        assert_eq!(brier_score(&params, &[]), 0.0);
        assert_eq!(tail_brier_score(&params, &[true, false], 0), 0.0);
        assert_eq!(tail_brier_score(&params, &[true, false], 9), brier_score(&params, &[true, false]));
    }
}
