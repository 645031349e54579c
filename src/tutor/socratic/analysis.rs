use serde::{Deserialize, Serialize};

use crate::tutor::text::{contains_any, contains_phrase, normalize, word_overlap};
use crate::tutor::types::clamp01;

const INSIGHT_WEIGHT: f64 = 0.3;
const CAUSAL_WEIGHT: f64 = 0.2;
const SELF_CORRECTION_WEIGHT: f64 = 0.25;
const ANALOGY_WEIGHT: f64 = 0.25;

const INSIGHT_PHRASES: &[&str] = &[
    "aha",
    "oh i see",
    "i see now",
    "now i get",
    "now i understand",
    "i understand now",
    "i realize",
    "i realise",
    "that makes sense",
    "it clicked",
    "got it",
];
const CAUSAL_PHRASES: &[&str] = &[
    "because",
    "therefore",
    "which means",
    "that means",
    "so that",
    "that's why",
    "thats why",
    "leads to",
    "causes",
];
const SELF_CORRECTION_PHRASES: &[&str] = &[
    "wait",
    "actually",
    "i was wrong",
    "my mistake",
    "on second thought",
    "i mean",
    "let me rethink",
];
const ANALOGY_PHRASES: &[&str] = &[
    "is like",
    "just like",
    "similar to",
    "just as",
    "reminds me",
    "same as",
    "kind of like",
];
const GENERALISATION_PHRASES: &[&str] = &[
    "in general",
    "generally",
    "always",
    "every",
    "any ",
    "works for",
    "applies to",
    "whenever",
];
const NO_IDEA_PHRASES: &[&str] = &["i don't know", "i dont know", "no idea", "not sure", "idk"];

const CORRECT_COVERAGE: f64 = 0.6;
const MISCONCEPTION_COVERAGE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderstandingLevel {
    None,
    Partial,
    Correct,
    Misconception,
    Advanced,
}

impl UnderstandingLevel {
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Correct | Self::Advanced)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryMoment {
    pub is_discovery: bool,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

fn coverage(normalized: &str, terms: &[String]) -> Option<f64> {
    let terms: Vec<String> = terms
        .iter()
        .map(|t| normalize(t).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return None;
    }
    let hits = terms.iter().filter(|t| contains_phrase(normalized, t)).count();
    Some(hits as f64 / terms.len() as f64)
}

/// Keyword coverage of the concept terms plus causal and generalisation
/// markers. A response that echoes most of the known misconception is
/// flagged as such before anything else.
pub fn classify_understanding(
    text: &str,
    concept_terms: &[String],
    misconception: Option<&str>,
) -> UnderstandingLevel {
    let normalized = normalize(text);
    if normalized.trim().is_empty() || contains_any(&normalized, NO_IDEA_PHRASES) {
        return UnderstandingLevel::None;
    }

    if misconception
        .and_then(|m| word_overlap(&normalized, m))
        .is_some_and(|overlap| overlap >= MISCONCEPTION_COVERAGE)
    {
        return UnderstandingLevel::Misconception;
    }

    let causal = contains_any(&normalized, CAUSAL_PHRASES);
    let general = contains_any(&normalized, GENERALISATION_PHRASES);

    match coverage(&normalized, concept_terms) {
        Some(c) if c >= CORRECT_COVERAGE && causal && general => UnderstandingLevel::Advanced,
        Some(c) if c >= CORRECT_COVERAGE => UnderstandingLevel::Correct,
        Some(c) if c > 0.0 || causal => UnderstandingLevel::Partial,
        Some(_) => UnderstandingLevel::None,
        None if causal && general => UnderstandingLevel::Correct,
        None if causal => UnderstandingLevel::Partial,
        None => UnderstandingLevel::None,
    }
}

/// Scores a response for signs of self-discovery. Each category counts once.
pub fn detect_discovery_moment(text: &str, threshold: f64) -> DiscoveryMoment {
    let normalized = normalize(text);
    let categories: [(&str, &[&str], f64); 4] = [
        ("insight", INSIGHT_PHRASES, INSIGHT_WEIGHT),
        ("causal_reasoning", CAUSAL_PHRASES, CAUSAL_WEIGHT),
        ("self_correction", SELF_CORRECTION_PHRASES, SELF_CORRECTION_WEIGHT),
        ("analogy", ANALOGY_PHRASES, ANALOGY_WEIGHT),
    ];

    let mut confidence = 0.0;
    let mut indicators = Vec::new();
    for (name, phrases, weight) in categories {
        if contains_any(&normalized, phrases) {
            confidence += weight;
            indicators.push(name.to_string());
        }
    }
    let confidence = clamp01(confidence);

    DiscoveryMoment {
        is_discovery: confidence > threshold,
        confidence,
        indicators,
    }
}
