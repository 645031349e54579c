//! Property-based tests for the tutoring algorithms
//!
//! - BKT output stays within [0.001, 0.999] and moves with the evidence
//! - Fewer than five attempts never produce a fit
//! - Exploration signals stay within [0, 1] for any duration or timestamp;
//!   accepted attempts read back unchanged, oversized ones are rejected
//! - Dialogue paths stay bounded and ending early always succeeds
//! - Assessments never trigger within ten minutes of the last one

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use tutor_backend_rust::tutor::assessment::{should_trigger_micro_assessment, AssessmentContext};
use tutor_backend_rust::tutor::config::{
    AssessmentConfig, BktConfig, ExplorationConfig, SocraticConfig,
};
use tutor_backend_rust::tutor::exploration::{
    calculate_productive_struggle_score, detect_frustration_level, get_scaffolding_level,
    record_attempt, start_exploration, tick_exploration, AttemptCategory, ExplorationAttempt,
    Problem,
};
use tutor_backend_rust::tutor::mastery::{bkt_update, fit_skill_bkt, BktParams};
use tutor_backend_rust::tutor::socratic::{
    advance_dialogue, end_dialogue_early, plan_dialogue, DialoguePlan, LearnerResponse,
};
use tutor_backend_rust::tutor::PracticeAttempt;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_params() -> impl Strategy<Value = BktParams> {
    (arb_unit(), arb_unit(), arb_unit(), arb_unit())
        .prop_map(|(l0, t, s, g)| BktParams::new(l0, t, s, g))
}

/// Slip and guess below 0.5, where a correct answer is evidence of mastery.
fn arb_identifiable_params() -> impl Strategy<Value = BktParams> {
    (arb_unit(), arb_unit(), 0u64..500u64, 0u64..500u64)
        .prop_map(|(l0, t, s, g)| BktParams::new(l0, t, s as f64 / 1000.0, g as f64 / 1000.0))
}

fn arb_category() -> impl Strategy<Value = AttemptCategory> {
    prop_oneof![
        Just(AttemptCategory::Correct),
        Just(AttemptCategory::PartiallyCorrect),
        Just(AttemptCategory::CreativeWrong),
        Just(AttemptCategory::CommonMisconception),
        Just(AttemptCategory::OffTrack),
    ]
}

/// Durations cover the whole u64 range; timestamps may fall before the
/// session start.
fn arb_attempt(index: i64) -> impl Strategy<Value = ExplorationAttempt> {
    let duration = prop_oneof![0u64..900_000u64, any::<u64>(), Just(u64::MAX)];
    (arb_category(), -0.5f64..1.5f64, duration, -600i64..600i64).prop_map(
        move |(category, creativity, duration_ms, offset_minutes)| ExplorationAttempt {
            approach: format!("attempt {index}"),
            category,
            partial_understanding: Vec::new(),
            misconceptions: Vec::new(),
            creativity_score: creativity,
            duration_ms,
            submitted_at: t0() + Duration::minutes(index * 2 + offset_minutes),
        },
    )
}

fn arb_attempts() -> impl Strategy<Value = Vec<ExplorationAttempt>> {
    (0usize..8).prop_flat_map(|n| (0..n as i64).map(arb_attempt).collect::<Vec<_>>())
}

fn arb_response() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("not sure".to_string()),
        Just("it is the rise over the run because steeper lines climb faster".to_string()),
        Just("oh i see, it is like a ramp because height grows".to_string()),
        Just("the bigger number is always the slope".to_string()),
        Just(String::new()),
        "[a-z ]{0,40}",
    ]
}

fn problem(max_attempts: usize) -> Problem {
    Problem {
        id: "p".to_string(),
        title: "Problem".to_string(),
        description: String::new(),
        concept: "fractions".to_string(),
        max_attempts,
        frustration_threshold_minutes: 15.0,
        correct_solution: "common denominator".to_string(),
        key_ideas: vec!["common denominator".to_string()],
        known_misconceptions: Vec::new(),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_bkt_output_is_bounded(p in -1.0f64..2.0f64, correct in any::<bool>(), params in arb_params()) {
        let next = bkt_update(p, correct, &params);
        prop_assert!((0.001..=0.999).contains(&next), "got {}", next);
    }

    #[test]
    fn prop_bkt_moves_with_evidence(p in 0.001f64..0.999f64, params in arb_identifiable_params()) {
        prop_assert!(bkt_update(p, true, &params) >= p - 1e-12);
        prop_assert!(bkt_update(p, false, &params) <= p + 1e-12);
    }

    #[test]
    fn prop_short_history_never_fits(outcomes in proptest::collection::vec(any::<bool>(), 0..5)) {
        let attempts: Vec<PracticeAttempt> = outcomes
            .iter()
            .enumerate()
            .map(|(i, &c)| PracticeAttempt::new(c, t0() + Duration::minutes(i as i64)))
            .collect();
        let result = fit_skill_bkt("s", &attempts, None, &BktConfig::default());
        prop_assert!(result.is_insufficient_data());
        prop_assert!(!result.converged);
    }

    #[test]
    fn prop_exploration_signals_are_bounded(attempts in arb_attempts(), idle_minutes in 0i64..60) {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(problem(attempts.len().max(1)), None, &config, t0());
        session.attempts = attempts;
        let now = session.last_activity_at() + Duration::minutes(idle_minutes);

        let frustration = detect_frustration_level(&session, &config, now);
        prop_assert!((0.0..=1.0).contains(&frustration));
        let struggle = calculate_productive_struggle_score(&session, frustration);
        prop_assert!((0.0..=1.0).contains(&struggle));

        let decision = get_scaffolding_level(&session, &config, now);
        prop_assert!(decision.elapsed_minutes.is_finite() && decision.elapsed_minutes >= 0.0);
        tick_exploration(&mut session, &config, t0() - Duration::minutes(idle_minutes));
        prop_assert!((0.0..=1.0).contains(&session.frustration_level));
        prop_assert!((0.0..=1.0).contains(&session.productive_struggle_score));
    }

    #[test]
    fn prop_recorded_attempt_reads_back(attempt in arb_attempt(1)) {
        let config = ExplorationConfig::default();
        let mut session = start_exploration(problem(5), None, &config, t0());
        let result = record_attempt(&mut session, attempt.clone(), &config, attempt.submitted_at);
        if attempt.duration_ms > config.max_attempt_duration_ms {
            prop_assert!(result.is_err());
            prop_assert!(session.attempts.is_empty());
            return Ok(());
        }
        prop_assert!(result.is_ok());

        let stored = &session.attempts[0];
        prop_assert_eq!(stored.category, attempt.category);
        prop_assert_eq!(stored.duration_ms, attempt.duration_ms);
        prop_assert_eq!(stored.submitted_at, attempt.submitted_at);
        prop_assert_eq!(stored.creativity_score, attempt.creativity_score.clamp(0.0, 1.0));
    }

    #[test]
    fn prop_dialogue_path_is_bounded(
        responses in proptest::collection::vec(arb_response(), 0..15),
        misconception in proptest::option::of(Just("the bigger number is the slope".to_string())),
        max_len in 1usize..12,
        end_after in 0usize..15,
    ) {
        let config = SocraticConfig::default();
        let mut state = plan_dialogue(
            DialoguePlan {
                learner_id: None,
                skill_id: "slope".to_string(),
                target_concept: "slope".to_string(),
                misconception,
                concept_terms: vec!["rise".to_string(), "run".to_string()],
                max_path_length: Some(max_len),
            },
            &config,
            t0(),
        );

        for (i, text) in responses.into_iter().enumerate() {
            if i == end_after {
                break;
            }
            let before = state.clone();
            match advance_dialogue(&state, LearnerResponse { text, understanding: None }, &config, t0()) {
                Ok(turn) => state = turn.state,
                Err(_) => {
                    prop_assert!(!before.is_active());
                    prop_assert_eq!(state.exchanges.len(), before.exchanges.len());
                }
            }
            prop_assert!(state.current_path_index <= state.dialogue_path.len());
            prop_assert!(state.dialogue_path.len() <= state.max_path_length);
        }

        let summary = end_dialogue_early(&mut state, &config, t0());
        prop_assert!(!state.is_active());
        prop_assert_eq!(summary.exchange_count, state.exchanges.len());
        prop_assert!((0.0..=1.0).contains(&summary.effectiveness));
    }

    #[test]
    fn prop_recent_assessment_never_triggers(minutes in 0.0f64..10.0f64, interactions in 0u32..500) {
        let context = AssessmentContext {
            learner_id: "u".to_string(),
            minutes_since_last_assessment: minutes.min(9.99),
            interactions_since_last_assessment: interactions,
            profile: None,
        };
        let decision = should_trigger_micro_assessment(&context, &AssessmentConfig::default());
        prop_assert!(!decision.should_trigger);
    }
}
