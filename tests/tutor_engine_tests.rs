use chrono::{DateTime, Duration, Utc};

mod common;

use tutor_backend_rust::tutor::engine::{AttemptSubmission, PracticeInput};
use tutor_backend_rust::tutor::exploration::{AttemptCategory, ExplorationStatus, Problem, SupportLevel};
use tutor_backend_rust::tutor::recommend::{LearnerContext, SkillCandidate};
use tutor_backend_rust::tutor::socratic::{DialoguePlan, DialogueStatus, LearnerResponse};
use tutor_backend_rust::tutor::TutorError;

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn practice(learner: &str, skill: &str, is_correct: bool, minute: i64) -> PracticeInput {
    PracticeInput {
        learner_id: learner.to_string(),
        skill_id: skill.to_string(),
        is_correct,
        timestamp: Some(t0() + Duration::minutes(minute)),
        response_time_ms: Some(4_000),
        hints_used: 0,
        is_retrieval: false,
    }
}

fn problem() -> Problem {
    Problem {
        id: "p1".to_string(),
        title: "Comparing fractions".to_string(),
        description: "Which is larger, 3/4 or 5/8?".to_string(),
        concept: "comparing fractions".to_string(),
        max_attempts: 0,
        frustration_threshold_minutes: 0.0,
        correct_solution: "Use a common denominator: 3/4 = 6/8, which is larger than 5/8.".to_string(),
        key_ideas: vec!["common denominator".to_string(), "equivalent fractions".to_string()],
        known_misconceptions: vec!["bigger denominator means bigger fraction".to_string()],
    }
}

#[tokio::test]
async fn test_fit_pools_every_learner() {
    let engine = common::create_engine();
    let pattern = [false, false, true, false, true, true, true, true];
    for learner in ["u1", "u2", "u3"] {
        for (i, &correct) in pattern.iter().enumerate() {
            engine
                .record_practice(practice(learner, "fractions", correct, i as i64), t0())
                .await
                .unwrap();
        }
    }

    let result = engine.fit_skill("fractions").unwrap();
    assert_eq!(result.attempt_count, 3 * pattern.len());
    assert!(!result.is_insufficient_data());

    let report = engine.validate(&[]);
    assert_eq!(report.skills.len(), 1);
    assert_eq!(report.skills[0].attempt_count, 3 * pattern.len());
}

#[tokio::test]
async fn test_recommend_reads_prerequisite_mastery_from_store() {
    let engine = common::create_engine();
    for i in 0..6 {
        engine
            .record_practice(practice("u1", "addition", true, i), t0())
            .await
            .unwrap();
    }

    let context = LearnerContext {
        learner_id: "u1".to_string(),
        candidates: vec![SkillCandidate {
            skill_id: "multiplication".to_string(),
            name: None,
            prerequisites: vec!["addition".to_string()],
            state: None,
            recent_results: Vec::new(),
        }],
        known_mastery: Default::default(),
        session_minutes: 10.0,
        profile: None,
    };
    let recs = engine.recommend(context, t0() + Duration::hours(1));
    assert_eq!(recs.len(), 1);
    assert!(recs[0].in_zpd);
    assert_eq!(recs[0].rank, 1);
}

#[tokio::test]
async fn test_retrieval_attempt_is_scored_and_spaced() {
    let engine = common::create_engine();
    for i in 0..4 {
        engine
            .record_practice(practice("u1", "fractions", true, i), t0())
            .await
            .unwrap();
    }
    let mut input = practice("u1", "fractions", true, 5);
    input.is_retrieval = true;
    let outcome = engine.record_practice(input, t0() + Duration::minutes(5)).await.unwrap();

    assert!(outcome.retrieval_strength.unwrap() > 0.8);
    assert!(outcome.state.last_retrieval_at.is_some());
    assert!(!outcome.retrieval.use_retrieval);
}

#[tokio::test]
async fn test_dialogue_runs_to_completion() {
    let engine = common::create_engine();
    let view = engine
        .start_dialogue(
            DialoguePlan {
                learner_id: Some("u1".to_string()),
                skill_id: "slope".to_string(),
                target_concept: "slope".to_string(),
                misconception: None,
                concept_terms: vec!["rise".to_string(), "run".to_string()],
                max_path_length: Some(2),
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(view.state.dialogue_path.len(), 2);

    let id = view.state.id.clone();
    let mut finished = None;
    for i in 0..2 {
        let reply = engine
            .respond_dialogue(
                &id,
                LearnerResponse {
                    text: "not sure".to_string(),
                    understanding: None,
                },
                t0() + Duration::minutes(i),
            )
            .await
            .unwrap();
        finished = reply.summary;
    }

    let summary = finished.expect("dialogue should complete after its path");
    assert_eq!(summary.status, DialogueStatus::Completed);
    assert_eq!(summary.exchange_count, 2);
    assert!((0.0..=1.0).contains(&summary.effectiveness));
}

#[tokio::test]
async fn test_exploration_consolidates_after_repeated_misconceptions() {
    let engine = common::create_engine();
    let session = engine.start_exploration(problem(), Some("u1".to_string()), t0()).unwrap();
    assert_eq!(session.problem.max_attempts, 5);

    let mut last = None;
    for i in 0..3 {
        let feedback = engine
            .submit_attempt(
                &session.id,
                AttemptSubmission {
                    approach: "random guess".to_string(),
                    category: Some(AttemptCategory::OffTrack),
                    creativity_score: Some(0.1),
                    duration_ms: 4 * 60_000,
                    submitted_at: Some(t0() + Duration::minutes(4 * (i + 1))),
                    ..AttemptSubmission::default()
                },
                t0() + Duration::minutes(4 * (i + 1)),
            )
            .await
            .unwrap();
        last = Some(feedback);
    }
    let feedback = last.unwrap();
    assert_eq!(feedback.decision.support, SupportLevel::Consolidate);
    assert_eq!(feedback.decision.level, 3);

    let consolidation = engine.consolidate(&session.id, t0() + Duration::minutes(13)).await.unwrap();
    assert_eq!(consolidation.attempt_reviews.len(), 3);

    let again = engine.consolidate(&session.id, t0() + Duration::minutes(20)).await.unwrap();
    assert_eq!(again.generated_at, consolidation.generated_at);

    let summary = engine.end_exploration(&session.id, t0() + Duration::minutes(30)).unwrap();
    assert_eq!(summary.status, ExplorationStatus::Consolidated);
    assert!(summary.consolidated);
}

#[tokio::test]
async fn test_text_attempts_are_categorized() {
    let engine = common::create_engine();
    let session = engine.start_exploration(problem(), None, t0()).unwrap();
    let feedback = engine
        .submit_attempt(
            &session.id,
            AttemptSubmission {
                approach: "the bigger denominator means bigger fraction so 5/8 wins".to_string(),
                duration_ms: 90_000,
                ..AttemptSubmission::default()
            },
            t0() + Duration::minutes(2),
        )
        .await
        .unwrap();
    let attempt = &feedback.session.attempts[0];
    assert_eq!(attempt.category, AttemptCategory::CommonMisconception);
    assert_eq!(attempt.misconceptions.len(), 1);
}

#[tokio::test]
async fn test_ended_exploration_rejects_consolidation() {
    let engine = common::create_engine();
    let session = engine.start_exploration(problem(), None, t0()).unwrap();
    let summary = engine.end_exploration(&session.id, t0()).unwrap();
    assert_eq!(summary.status, ExplorationStatus::EndedEarly);

    let err = engine.consolidate(&session.id, t0()).await.unwrap_err();
    assert!(matches!(err, TutorError::InvalidTransition(_)));
}
