use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::session::{AttemptCategory, ExplorationAttempt, Problem};
use crate::tutor::text::{normalize, significant_words, word_overlap};
use crate::tutor::types::clamp01;

const IDEA_MATCH: f64 = 0.5;
const MISCONCEPTION_MATCH: f64 = 0.6;
const SOLUTION_MATCH: f64 = 0.8;
const CREATIVE_THRESHOLD: f64 = 0.5;
/// Approaches shorter than this many significant words earn partial
/// creativity credit.
const CREATIVITY_FULL_WORDS: f64 = 8.0;

/// Share of the learner's words that do not already appear in the problem
/// material, scaled down for very short answers.
pub fn creativity_score(problem: &Problem, approach: &str) -> f64 {
    let words: HashSet<String> = significant_words(approach).into_iter().collect();
    if words.is_empty() {
        return 0.0;
    }
    let mut known: HashSet<String> = HashSet::new();
    for text in [&problem.title, &problem.description, &problem.correct_solution, &problem.concept] {
        known.extend(significant_words(text));
    }
    for text in problem.key_ideas.iter().chain(problem.known_misconceptions.iter()) {
        known.extend(significant_words(text));
    }

    let novel = words.iter().filter(|w| !known.contains(*w)).count();
    let novelty = novel as f64 / words.len() as f64;
    clamp01(novelty * (words.len() as f64 / CREATIVITY_FULL_WORDS).min(1.0))
}

/// Keyword analysis of a free-text approach against the problem's key ideas
/// and known misconceptions.
pub fn categorize_attempt(
    problem: &Problem,
    approach: &str,
    duration_ms: u64,
    submitted_at: DateTime<Utc>,
) -> ExplorationAttempt {
    let normalized = normalize(approach);

    let partial_understanding: Vec<String> = problem
        .key_ideas
        .iter()
        .filter(|idea| word_overlap(&normalized, idea).is_some_and(|o| o >= IDEA_MATCH))
        .cloned()
        .collect();
    let misconceptions: Vec<String> = problem
        .known_misconceptions
        .iter()
        .filter(|m| word_overlap(&normalized, m).is_some_and(|o| o >= MISCONCEPTION_MATCH))
        .cloned()
        .collect();
    let solution_match = word_overlap(&normalized, &problem.correct_solution).unwrap_or(0.0);
    let creativity = creativity_score(problem, approach);

    let all_ideas = !problem.key_ideas.is_empty() && partial_understanding.len() == problem.key_ideas.len();
    let category = if misconceptions.is_empty() && (all_ideas || solution_match >= SOLUTION_MATCH) {
        AttemptCategory::Correct
    } else if !misconceptions.is_empty() {
        AttemptCategory::CommonMisconception
    } else if !partial_understanding.is_empty() {
        AttemptCategory::PartiallyCorrect
    } else if creativity >= CREATIVE_THRESHOLD {
        AttemptCategory::CreativeWrong
    } else {
        AttemptCategory::OffTrack
    };

    ExplorationAttempt {
        approach: approach.to_string(),
        category,
        partial_understanding,
        misconceptions,
        creativity_score: creativity,
        duration_ms,
        submitted_at,
    }
}
